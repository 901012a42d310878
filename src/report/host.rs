/// Name of the machine the planner runs on, for the report header.
#[cfg(unix)]
#[allow(unsafe_code)]
pub(crate) fn server_name() -> String {
    let mut buf = [0u8; 256];
    let ret = unsafe { libc::gethostname(buf.as_mut_ptr().cast::<libc::c_char>(), buf.len()) };
    if ret != 0 {
        tracing::warn!("gethostname failed: {}", std::io::Error::last_os_error());
        return "unknown".to_string();
    }
    let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..len]).into_owned()
}

#[cfg(not(unix))]
pub(crate) fn server_name() -> String {
    std::env::var("COMPUTERNAME").unwrap_or_else(|_| "unknown".to_string())
}
