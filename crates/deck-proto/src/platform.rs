use std::path::{Path, PathBuf};

pub fn data_dir() -> PathBuf {
    // On macOS and Linux, use ~/.local/share/deck/ (XDG standard)
    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".local")
            .join("share")
            .join("deck")
    }
    #[cfg(windows)]
    {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("deck")
    }
}

pub fn config_dir() -> PathBuf {
    // On macOS and Linux, always use ~/.config/deck/
    // (avoid macOS Application Support folder for consistency)
    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("deck")
    }

    #[cfg(windows)]
    {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("deck")
    }
}

pub fn temp_dir() -> PathBuf {
    std::env::temp_dir()
}

/// Where the browser opens when nothing else is configured.
pub fn default_music_dir() -> PathBuf {
    dirs::audio_dir()
        .filter(|p| p.is_dir())
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(unix)]
pub fn mpv_binary_name() -> &'static str {
    "mpv"
}

#[cfg(windows)]
pub fn mpv_binary_name() -> &'static str {
    "mpv.exe"
}

/// A fresh IPC endpoint name for one engine instance.
///
/// Unix: a socket path in the temp dir.  Windows: a bare pipe name; the
/// `\\.\pipe\` prefix is added by [`ipc_server_arg`] and the client.
pub fn ipc_endpoint() -> PathBuf {
    let tag = format!("deck-mpv-{}-{:08x}", std::process::id(), rand::random::<u32>());
    #[cfg(unix)]
    {
        temp_dir().join(format!("{}.sock", tag))
    }
    #[cfg(windows)]
    {
        PathBuf::from(tag)
    }
}

#[cfg(unix)]
pub fn ipc_server_arg(endpoint: &Path) -> String {
    format!("--input-ipc-server={}", endpoint.display())
}

#[cfg(windows)]
pub fn ipc_server_arg(endpoint: &Path) -> String {
    format!("--input-ipc-server=\\\\.\\pipe\\{}", endpoint.display())
}

fn find_on_path(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|p| p.is_file())
}

/// Find mpv binary for playback.
/// An explicit override wins; otherwise checks beside the current exe, then PATH.
pub fn find_mpv_binary(override_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = override_path {
        return p.is_file().then(|| p.to_path_buf());
    }

    let exe_name = mpv_binary_name();
    if let Ok(current_exe) = std::env::current_exe() {
        if let Some(dir) = current_exe.parent() {
            let local_mpv = dir.join(exe_name);
            if local_mpv.is_file() {
                return Some(local_mpv);
            }
        }
    }

    find_on_path(exe_name)
}
