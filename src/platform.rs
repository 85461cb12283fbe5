//! Platform integration points: system proxy and login startup.
//!
//! The shell calls only this capability interface; platforms that have no
//! integration report `Unsupported` instead of compiling the call sites out,
//! so the UI can tell the user rather than silently doing nothing.

use anyhow::Result;

/// Outcome of a platform-services call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformSupport {
    /// The setting was applied.
    Applied,
    /// The current platform has no integration for this setting.
    Unsupported,
}

/// OS-level settings the shell can toggle on the user's behalf.
pub trait PlatformServices {
    /// Registers (or unregisters) the server as the system HTTP proxy.
    fn set_system_proxy(&self, address: &str, port: &str, enable: bool) -> Result<PlatformSupport>;

    /// Registers (or unregisters) the shell to start on login.
    fn set_login_startup(&self, enable: bool) -> Result<PlatformSupport>;
}

/// Returns the platform services implementation for the current OS.
pub fn services() -> impl PlatformServices {
    OsServices
}

pub struct OsServices;

#[cfg(windows)]
impl PlatformServices for OsServices {
    fn set_system_proxy(
        &self,
        _address: &str,
        _port: &str,
        _enable: bool,
    ) -> Result<PlatformSupport> {
        // TODO: write ProxyServer/ProxyEnable under
        // HKCU\Software\Microsoft\Windows\CurrentVersion\Internet Settings
        // and notify WinInet of the change.
        Ok(PlatformSupport::Unsupported)
    }

    fn set_login_startup(&self, _enable: bool) -> Result<PlatformSupport> {
        // TODO: manage the Run-key entry under
        // HKCU\Software\Microsoft\Windows\CurrentVersion\Run.
        Ok(PlatformSupport::Unsupported)
    }
}

#[cfg(not(windows))]
impl PlatformServices for OsServices {
    fn set_system_proxy(
        &self,
        _address: &str,
        _port: &str,
        _enable: bool,
    ) -> Result<PlatformSupport> {
        Ok(PlatformSupport::Unsupported)
    }

    fn set_login_startup(&self, _enable: bool) -> Result<PlatformSupport> {
        Ok(PlatformSupport::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_platforms_report_unsupported() {
        let services = services();
        let proxy = services.set_system_proxy("127.0.0.1", "8080", true).unwrap();
        let startup = services.set_login_startup(true).unwrap();
        // Neither call may error out; unsupported is a normal answer.
        assert!(matches!(
            proxy,
            PlatformSupport::Applied | PlatformSupport::Unsupported
        ));
        assert!(matches!(
            startup,
            PlatformSupport::Applied | PlatformSupport::Unsupported
        ));
    }
}
