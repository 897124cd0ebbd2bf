//! External kiosk browser host
//!
//! The display surface is a browser process started against a dedicated
//! profile. Every launch gets a generation number; a supervisor thread per
//! launch checks the target is reachable, spawns the browser, reports the outcome and
//! waits for the child. A supervisor whose generation has been superseded
//! terminates its child and stays silent.

use std::fs;
use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tracing::{debug, error, info, trace, warn};

use crate::constants::{browser, paths, timing};
use crate::events::{EventSender, GoneReason, HostEvent, KioskEvent, ProcessGoneDetails};
use crate::input_gate::{InputVerdict, KeyInput};
use crate::surface::{DisplaySurface, HostRuntime, SurfaceOptions, WindowOpenDecision};

/// Net error codes reported with load failures
const ERR_FAILED: i32 = -2;
const ERR_CONNECTION_REFUSED: i32 = -102;
const ERR_NAME_NOT_RESOLVED: i32 = -105;
const ERR_ADDRESS_UNREACHABLE: i32 = -109;
const ERR_CONNECTION_TIMED_OUT: i32 = -118;

/// Upper bound on waiting for a superseded browser to release the profile
const PROFILE_RELEASE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
struct LoadError {
    code: i32,
    description: String,
}

impl LoadError {
    fn new(code: i32, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
        }
    }
}

pub struct BrowserHost {
    command: String,
    profile_dir: PathBuf,
}

impl BrowserHost {
    pub fn new(command: impl Into<String>, profile_dir: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            profile_dir: profile_dir.into(),
        }
    }

    /// `<data_dir>/camera-kiosk/profile`
    pub fn default_profile_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(paths::APP_DIR)
            .join(paths::PROFILE_DIR)
    }
}

impl HostRuntime for BrowserHost {
    type Surface = BrowserSurface;

    fn create_surface(
        &mut self,
        options: &SurfaceOptions,
        events: EventSender,
    ) -> Result<BrowserSurface> {
        let profile = Profile::prepare(&self.profile_dir, options)?;
        info!(
            browser = %self.command,
            profile = %profile.dir.display(),
            "Prepared browser profile"
        );

        let launched_style = profile.current_style();
        let surface = BrowserSurface {
            command: self.command.clone(),
            options: options.clone(),
            profile,
            events: events.clone(),
            url: None,
            launches: Arc::new(Launches::default()),
            written_style: launched_style.clone(),
            launched_style,
            suppressed_keys: 0,
        };

        events
            .send(KioskEvent::Host(HostEvent::SurfaceReady))
            .context("Event loop closed before surface was ready")?;
        Ok(surface)
    }
}

/// Browser profile directory with kiosk preferences
struct Profile {
    dir: PathBuf,
}

impl Profile {
    fn prepare(dir: &Path, options: &SurfaceOptions) -> Result<Self> {
        let chrome = dir.join(browser::CHROME_DIR);
        fs::create_dir_all(&chrome)
            .with_context(|| format!("Failed to create profile directory {}", chrome.display()))?;

        let prefs_path = dir.join(browser::USER_JS);
        fs::write(&prefs_path, user_prefs(options))
            .with_context(|| format!("Failed to write {}", prefs_path.display()))?;

        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    fn style_path(&self) -> PathBuf {
        self.dir.join(browser::CHROME_DIR).join(browser::USER_CONTENT_CSS)
    }

    fn current_style(&self) -> Option<String> {
        fs::read_to_string(self.style_path()).ok()
    }

    /// Write the user style sheet; false when it already had this content
    fn write_style(&self, stylesheet: &str) -> Result<bool> {
        if self.current_style().as_deref() == Some(stylesheet) {
            return Ok(false);
        }
        let path = self.style_path();
        fs::write(&path, stylesheet)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(true)
    }
}

fn user_prefs(options: &SurfaceOptions) -> String {
    let mut prefs = vec![
        pref("toolkit.legacyUserProfileCustomizations.stylesheets", "true"),
        pref("browser.display.background_color", &format!("\"{}\"", options.background)),
        pref("browser.sessionstore.resume_from_crash", "false"),
        pref("browser.shell.checkDefaultBrowser", "false"),
        pref("browser.startup.homepage_override.mstone", "\"ignore\""),
        // Quit and close shortcuts must never end the kiosk
        pref("browser.quitShortcut.disabled", "true"),
        pref("browser.tabs.closeWindowWithLastTab", "false"),
        // Popups are denied, never opened over the grid
        pref("dom.disable_open_during_load", "true"),
        pref("dom.popup_allowed_events", "\"\""),
        pref("dom.disable_window_flip", "true"),
        pref("network.http.max-connections", &browser::MAX_CONNECTIONS.to_string()),
        pref(
            "network.http.max-persistent-connections-per-server",
            &browser::MAX_CONNECTIONS_PER_SERVER.to_string(),
        ),
        pref("network.http.http2.enabled", "false"),
        // Cameras behind a local CA
        pref("security.enterprise_roots.enabled", "true"),
    ];
    if cfg!(any(target_arch = "arm", target_arch = "aarch64")) {
        prefs.push(pref("layers.acceleration.disabled", "true"));
    }
    if !options.dev_tools {
        prefs.push(pref("devtools.policy.disabled", "true"));
    }
    let mut text = prefs.join("\n");
    text.push('\n');
    text
}

fn pref(name: &str, value: &str) -> String {
    format!(r#"user_pref("{name}", {value});"#)
}

/// Generation counter and the pid of the browser that belongs to it
#[derive(Default)]
struct Launches {
    generation: AtomicU64,
    child: Mutex<Option<(u64, u32)>>,
}

impl Launches {
    fn next(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Record the browser of `generation`; false once that launch is superseded
    fn set_child(&self, generation: u64, pid: u32) -> bool {
        let mut child = self.child.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.is_current(generation) || matches!(*child, Some((owner, _)) if owner > generation)
        {
            return false;
        }
        *child = Some((generation, pid));
        true
    }

    fn clear_child(&self, generation: u64) {
        let mut child = self.child.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(*child, Some((owner, _)) if owner == generation) {
            *child = None;
        }
    }

    /// A browser from an earlier launch still holds the profile
    fn older_child_running(&self, generation: u64) -> bool {
        matches!(
            *self.child.lock().unwrap_or_else(PoisonError::into_inner),
            Some((owner, _)) if owner < generation
        )
    }

    fn take_child(&self) -> Option<u32> {
        self.child
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .map(|(_, pid)| pid)
    }
}

pub struct BrowserSurface {
    command: String,
    options: SurfaceOptions,
    profile: Profile,
    events: EventSender,
    url: Option<String>,
    launches: Arc<Launches>,
    /// Style sheet the running browser started with
    launched_style: Option<String>,
    written_style: Option<String>,
    suppressed_keys: u64,
}

impl BrowserSurface {
    fn launch(&mut self) -> Result<()> {
        let url = self.url.clone().context("No URL loaded")?;
        let generation = self.launches.next();
        self.launched_style = self.written_style.clone();

        let command = browser_command(&self.command, &self.options, &self.profile.dir, &url);
        let launches = Arc::clone(&self.launches);
        let events = self.events.clone();
        thread::Builder::new()
            .name("kiosk-browser".to_string())
            .spawn(move || supervise(generation, &url, command, &launches, &events))
            .context("Failed to spawn browser supervisor")?;
        debug!(generation, "Browser launch requested");
        Ok(())
    }

    fn terminate(&mut self) {
        self.launches.next();
        if let Some(pid) = self.launches.take_child() {
            info!(pid, "Stopping browser");
            send_term(pid);
        }
    }
}

impl DisplaySurface for BrowserSurface {
    fn load(&mut self, url: &str) -> Result<()> {
        self.url = Some(url.to_string());
        self.launch()
    }

    fn reload(&mut self) -> Result<()> {
        if self.url.is_none() {
            bail!("Reload before any URL was loaded");
        }
        self.launch()
    }

    fn inject_style(&mut self, stylesheet: &str) -> Result<()> {
        let written = self.profile.write_style(stylesheet)?;
        self.written_style = Some(stylesheet.to_string());
        debug!(written, "User style sheet up to date");

        if self.launched_style.as_deref() != Some(stylesheet) && self.url.is_some() {
            info!("Style sheet changed, relaunching browser");
            self.launch()?;
        }
        Ok(())
    }

    /// The grabbing keyboard feed has already swallowed suppressed keys
    fn resolve_input(&mut self, input: &KeyInput, verdict: InputVerdict) {
        match verdict {
            InputVerdict::Suppress => {
                self.suppressed_keys += 1;
                debug!(key = %input.key, total = self.suppressed_keys, "Shortcut suppressed");
            }
            InputVerdict::Allow | InputVerdict::Terminate => {
                trace!(key = %input.key, "Key allowed");
            }
        }
    }

    fn resolve_window_open(&mut self, url: &str, decision: WindowOpenDecision) {
        debug!(url = %url, decision = ?decision, "Window open resolved");
    }

    fn close(&mut self) {
        self.terminate();
    }
}

impl Drop for BrowserSurface {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn browser_command(program: &str, options: &SurfaceOptions, profile: &Path, url: &str) -> Command {
    let mut command = Command::new(program);
    if options.kiosk {
        command.arg("--kiosk");
    } else {
        command
            .arg("--width")
            .arg(options.width.to_string())
            .arg("--height")
            .arg(options.height.to_string());
    }
    command
        .arg("--profile")
        .arg(profile)
        .arg(url)
        .stdin(Stdio::null());
    command
}

/// Run one browser launch to completion
fn supervise(
    generation: u64,
    url: &str,
    mut command: Command,
    launches: &Launches,
    events: &EventSender,
) {
    let send = |event: HostEvent| {
        if launches.is_current(generation) {
            let _ = events.send(KioskEvent::Host(event));
        }
    };

    if let Err(e) = check_reachable(url) {
        debug!(generation, code = e.code, "Reachability check failed");
        send(HostEvent::LoadFailed {
            code: e.code,
            description: e.description,
        });
        return;
    }

    let waiting_since = Instant::now();
    while launches.older_child_running(generation) {
        if waiting_since.elapsed() > PROFILE_RELEASE_TIMEOUT {
            warn!(generation, "Previous browser did not exit, launching anyway");
            break;
        }
        thread::sleep(timing::SUPERVISOR_POLL);
    }

    if !launches.is_current(generation) {
        trace!(generation, "Launch superseded before spawn");
        return;
    }

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            error!(error = ?e, "Failed to launch browser");
            send(HostEvent::LoadFailed {
                code: ERR_FAILED,
                description: format!("Failed to launch browser: {e}"),
            });
            return;
        }
    };

    let pid = child.id();
    if launches.set_child(generation, pid) {
        info!(pid, generation, "Browser launched");
        send(HostEvent::LoadFinished);
    } else {
        debug!(pid, generation, "Launch superseded during spawn");
    }

    let status = wait_while_current(&mut child, generation, launches);
    launches.clear_child(generation);
    match status {
        Ok(status) if launches.is_current(generation) => {
            info!(pid, status = %status, "Browser exited");
            send(exit_event(status));
        }
        Ok(status) => debug!(pid, status = %status, "Superseded browser exited"),
        Err(e) => error!(pid, error = ?e, "Failed to wait for browser"),
    }
}

/// Wait for the child; once superseded it gets SIGTERM, then SIGKILL after a grace period
fn wait_while_current(
    child: &mut Child,
    generation: u64,
    launches: &Launches,
) -> io::Result<ExitStatus> {
    let mut term_sent: Option<Instant> = None;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if !launches.is_current(generation) {
            match term_sent {
                None => {
                    send_term(child.id());
                    term_sent = Some(Instant::now());
                }
                Some(at) if at.elapsed() > timing::BROWSER_TERM_GRACE => {
                    warn!(pid = child.id(), "Browser ignored SIGTERM, killing");
                    child.kill()?;
                }
                Some(_) => {}
            }
        }
        thread::sleep(timing::SUPERVISOR_POLL);
    }
}

fn send_term(pid: u32) {
    let Ok(raw) = i32::try_from(pid) else {
        return;
    };
    if let Err(e) = signal::kill(Pid::from_raw(raw), Signal::SIGTERM) {
        debug!(pid, error = %e, "SIGTERM not delivered");
    }
}

fn exit_event(status: ExitStatus) -> HostEvent {
    if status.success() {
        return HostEvent::Closed;
    }
    let details = match status.signal() {
        Some(sig) => ProcessGoneDetails {
            reason: if sig == Signal::SIGKILL as i32 {
                GoneReason::Killed
            } else {
                GoneReason::Crashed
            },
            exit_code: None,
            signal: Some(sig),
        },
        None => ProcessGoneDetails {
            reason: GoneReason::Crashed,
            exit_code: status.code(),
            signal: None,
        },
    };
    HostEvent::ProcessGone(details)
}

/// Host and port to connect to for an http(s) URL; other schemes are not checked
fn reachability_target(url: &str) -> Option<(String, u16)> {
    let (scheme, rest) = url.split_once("://")?;
    let default_port = match scheme.to_ascii_lowercase().as_str() {
        "http" => 80,
        "https" => 443,
        _ => return None,
    };

    let authority = rest.split(['/', '?', '#']).next().unwrap_or(rest);
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, host_port)| host_port);

    let (host, port) = if let Some(bracketed) = host_port.strip_prefix('[') {
        let (host, after) = bracketed.split_once(']')?;
        match after.strip_prefix(':') {
            Some(port) => (host, port.parse().ok()?),
            None => (host, default_port),
        }
    } else {
        match host_port.rsplit_once(':') {
            Some((host, port)) => (host, port.parse().ok()?),
            None => (host_port, default_port),
        }
    };

    if host.is_empty() {
        return None;
    }
    Some((host.to_string(), port))
}

fn check_reachable(url: &str) -> std::result::Result<(), LoadError> {
    let Some((host, port)) = reachability_target(url) else {
        return Ok(());
    };

    let addrs: Vec<SocketAddr> = (host.as_str(), port)
        .to_socket_addrs()
        .map_err(|_| LoadError::new(ERR_NAME_NOT_RESOLVED, "ERR_NAME_NOT_RESOLVED"))?
        .collect();

    let mut last = LoadError::new(ERR_NAME_NOT_RESOLVED, "ERR_NAME_NOT_RESOLVED");
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timing::REACHABILITY_TIMEOUT) {
            Ok(_) => return Ok(()),
            Err(e) => last = connect_error(&e),
        }
    }
    Err(last)
}

fn connect_error(error: &io::Error) -> LoadError {
    match error.kind() {
        io::ErrorKind::ConnectionRefused => {
            LoadError::new(ERR_CONNECTION_REFUSED, "ERR_CONNECTION_REFUSED")
        }
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
            LoadError::new(ERR_CONNECTION_TIMED_OUT, "ERR_CONNECTION_TIMED_OUT")
        }
        io::ErrorKind::HostUnreachable | io::ErrorKind::NetworkUnreachable => {
            LoadError::new(ERR_ADDRESS_UNREACHABLE, "ERR_ADDRESS_UNREACHABLE")
        }
        _ => LoadError::new(ERR_FAILED, format!("ERR_FAILED: {error}")),
    }
}
