// Keytap Daemon
// Captures matching keyboards and re-injects remapped keys through a virtual device

use std::collections::HashSet;
use std::os::unix::io::AsRawFd;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;

use keytap_core::device::{is_event_node, truncate_device_name, DeviceError};
use keytap_core::hotplug::InotifyWatch;
use keytap_core::{
    create_output, exit, Config, ConfigError, DeviceManager, Emitter, EvdevBackend, GrabDecision,
    GrabRules, HotplugError, InputBackend, InputDevice, KeyActionMap, KeyEvent, KeyboardId,
    OutputError, UinputBackend,
};

/// Poll timeout, so the running flag is checked even when no device is active
const POLL_TIMEOUT_MS: i32 = 200;

/// Keyboard remapping daemon
#[derive(Parser, Debug)]
#[command(name = "keytap")]
#[command(version)]
#[command(about = "Grab keyboards by name and remap them through a virtual device", long_about = None)]
struct Args {
    /// TOML configuration file (default: ~/.config/keytap/config.toml)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Validate config and exit
    #[arg(long)]
    check_config: bool,

    /// List input devices and what the grab rules decide for each, without grabbing
    #[arg(long)]
    list_devices: bool,

    /// Do not watch for hot-plugged devices
    #[arg(long)]
    no_watch: bool,
}

/// Errors that end the daemon
#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Output(#[from] OutputError),

    #[error(transparent)]
    Hotplug(#[from] HotplugError),

    #[error(transparent)]
    Scan(#[from] DeviceError),

    #[error("poll failed: {0}")]
    Poll(#[source] std::io::Error),
}

impl AppError {
    fn exit_code(&self) -> i32 {
        match self {
            AppError::Config(e) => e.exit_code(),
            AppError::Output(e) => e.exit_code(),
            AppError::Hotplug(e) => e.exit_code(),
            AppError::Scan(_) | AppError::Poll(_) => exit::STARTUP_FAILED,
        }
    }
}

/// Resolver bound to one captured keyboard: translates each key through its
/// root map and writes it to the shared output device.
struct RemapResolver {
    keymap: Arc<KeyActionMap>,
    emitter: Emitter,
}

impl RemapResolver {
    fn new(keymap: Arc<KeyActionMap>, emitter: Emitter) -> Self {
        Self { keymap, emitter }
    }

    fn resolve(&self, event: KeyEvent) -> KeyEvent {
        match self.keymap.get(event.code) {
            Some(code) => event.with_code(code),
            None => event,
        }
    }

    fn handle(&mut self, event: KeyEvent) -> Result<(), OutputError> {
        self.emitter.emit(self.resolve(event))
    }
}

/// What the grab rules decide for `name`, in the words `--list-devices` prints.
///
/// `name` must already be cut the way the grabber cuts it.
fn describe_decision(rules: &GrabRules<KeyActionMap>, name: &str) -> String {
    match rules.decide(name) {
        GrabDecision::Grab { rule, root } => {
            format!("grab (rule {}, keymap '{}')", rule, root.name())
        }
        GrabDecision::Ignore { rule } => format!("ignore (rule {})", rule),
        GrabDecision::NoMatch => "no match".to_string(),
    }
}

/// Main application state
struct Application {
    config: Config,
    args: Args,
    /// Flag to signal event loop to stop
    running: Arc<AtomicBool>,
}

impl Application {
    fn new(args: Args) -> Result<Self, AppError> {
        let config = Config::load(args.config.as_deref())?;
        Ok(Self {
            config,
            args,
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Print the loaded configuration
    fn check_config(&self) {
        match self.config.source_path() {
            Some(path) => println!("Configuration {} is valid", path.display()),
            None => println!("No configuration file, using built-in rules"),
        }
        println!(
            "  capacity = {}, input_dir = {}, hotplug = {}",
            self.config.daemon.capacity,
            self.config.daemon.input_dir.display(),
            self.config.daemon.hotplug
        );
        for (name, keymap) in &self.config.keymaps {
            println!("  keymap '{}': {} remap(s)", name, keymap.len());
        }
        for (index, rule) in self.config.rules.iter().enumerate() {
            let action = if rule.is_ignore() { "ignore" } else { "grab" };
            println!("  rule {}: {} /{}/", index, action, rule.pattern());
        }
    }

    /// List event nodes and the arbitration outcome for each
    fn list_devices(&self) -> Result<(), AppError> {
        let backend = EvdevBackend::new(&self.config.daemon.input_dir);
        let mut nodes = backend
            .list_nodes()
            .map_err(|source| DeviceError::ListNodes {
                dir: backend.input_dir().to_path_buf(),
                source,
            })?;
        nodes.retain(|name| is_event_node(name));
        nodes.sort();

        for node in nodes {
            let path = backend.input_dir().join(&node);
            let device = match backend.open(&path) {
                Ok(device) => device,
                Err(e) => {
                    println!("  {}: {}", path.display(), e);
                    continue;
                }
            };
            let full_name = device.name().unwrap_or_default();
            let name = truncate_device_name(&full_name);
            println!(
                "  {}: '{}' -> {}",
                path.display(),
                name,
                describe_decision(&self.config.rules, name)
            );
        }
        Ok(())
    }

    fn install_signal_handler(&self) {
        use signal_hook::iterator::Signals;
        let running = self.running.clone();

        // Spawn a thread to handle signals
        std::thread::spawn(move || {
            if let Ok(mut signals) =
                Signals::new([signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM])
            {
                if signals.forever().next().is_some() {
                    log::info!("Received signal, shutting down");
                    running.store(false, Ordering::SeqCst);
                }
            }
        });
    }

    /// Run the main event loop
    fn run(&self) -> Result<(), AppError> {
        let daemon = &self.config.daemon;
        let emitter = create_output(&UinputBackend)?;

        let mut manager = DeviceManager::new(
            EvdevBackend::new(&daemon.input_dir),
            self.config.rules.clone(),
            emitter,
            RemapResolver::new,
            daemon.capacity,
        );

        // Register the watch before scanning so nodes created in between are not lost
        let mut watch = if daemon.hotplug && !self.args.no_watch {
            Some(InotifyWatch::new(&daemon.input_dir)?)
        } else {
            None
        };

        manager.scan()?;
        if manager.registry().is_empty() {
            log::warn!("No device matched a grab rule yet");
        }

        self.install_signal_handler();
        log::info!("keytap is running. Press Ctrl+C to exit.");

        // Devices that errored (usually unplugged); they stay registered but are not polled
        let mut lost: HashSet<KeyboardId> = HashSet::new();

        while self.running.load(Ordering::SeqCst) {
            let mut ids = Vec::new();
            let mut poll_fds = Vec::new();
            manager.registry().for_each(|id, entry| {
                if !lost.contains(&id) {
                    ids.push(id);
                    poll_fds.push(libc::pollfd {
                        fd: entry.device.as_raw_fd(),
                        events: libc::POLLIN,
                        revents: 0,
                    });
                }
            });
            if let Some(watch) = &watch {
                poll_fds.push(libc::pollfd {
                    fd: watch.as_raw_fd(),
                    events: libc::POLLIN,
                    revents: 0,
                });
            }

            let ready = unsafe {
                libc::poll(
                    poll_fds.as_mut_ptr(),
                    poll_fds.len() as libc::nfds_t,
                    POLL_TIMEOUT_MS,
                )
            };
            if ready < 0 {
                let err = std::io::Error::last_os_error();
                if err.kind() == std::io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(AppError::Poll(err));
            }
            if ready == 0 {
                continue;
            }

            for (id, pfd) in ids.iter().zip(&poll_fds) {
                if pfd.revents == 0 {
                    continue;
                }
                let Some(entry) = manager.registry_mut().get_mut(*id) else {
                    continue;
                };
                if pfd.revents & libc::POLLIN == 0 {
                    log::warn!("{}: device gone, restart keytap to recover it", entry.path.display());
                    lost.insert(*id);
                    continue;
                }
                match entry.device.read_events() {
                    Ok(events) => {
                        for event in events {
                            if let Err(e) = entry.resolver.handle(event) {
                                log::error!("Error sending output: {}", e);
                            }
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
                    Err(e) => {
                        log::warn!(
                            "{}: {}; restart keytap to recover it",
                            entry.path.display(),
                            e
                        );
                        lost.insert(*id);
                    }
                }
            }

            if let Some(watch) = watch.as_mut() {
                let watch_ready = poll_fds
                    .last()
                    .is_some_and(|pfd| pfd.revents != 0);
                if watch_ready {
                    manager.poll_hotplug(watch)?;
                }
            }
        }

        log::info!("Shutting down, releasing {} device(s)", manager.registry().len());
        Ok(())
    }
}

fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let result = Application::new(args).and_then(|app| {
        if app.args.check_config {
            app.check_config();
            Ok(())
        } else if app.args.list_devices {
            app.list_devices()
        } else {
            app.run()
        }
    });

    if let Err(e) = result {
        log::error!("{}", e);
        std::process::exit(e.exit_code());
    }
}
