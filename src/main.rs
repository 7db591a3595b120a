use clap::Parser;
use color_eyre::Result;
use overstock::{App, AppConfig, AppEvent, Args, CacheManager, ConfigManager, Theme, APP_NAME};
use ratatui::DefaultTerminal;
use std::sync::mpsc::channel;

fn render(terminal: &mut DefaultTerminal, app: &mut App) -> Result<()> {
    terminal.draw(|frame| frame.render_widget(app, frame.area()))?;
    Ok(())
}

fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let user = AppConfig::load_from(path)?;
            let mut merged = AppConfig::default();
            merged.merge(user);
            merged.validate()?;
            merged
        }
        None => AppConfig::load(APP_NAME)?,
    };

    if let Some(server) = &args.server {
        config.backend.base_url = server.clone();
    }
    if args.debug {
        config.debug.enabled = true;
    }

    Ok(config)
}

fn run(mut terminal: DefaultTerminal, args: &Args) -> Result<()> {
    let config = load_config(args)?;
    let theme = Theme::from_config(&config.theme)?;
    let poll_interval = std::time::Duration::from_millis(config.performance.event_poll_interval_ms);
    let debug = config.debug.enabled;

    let (tx, rx) = channel::<AppEvent>();
    let mut app = App::new_with_config(tx.clone(), theme, config);
    if debug {
        app.enable_debug();
    }
    render(&mut terminal, &mut app)?;

    loop {
        if crossterm::event::poll(poll_interval)? {
            match crossterm::event::read()? {
                crossterm::event::Event::Key(key) => tx.send(AppEvent::Key(key))?,
                crossterm::event::Event::Resize(cols, rows) => {
                    tx.send(AppEvent::Resize(cols, rows))?
                }
                _ => {}
            }
        }

        let updated = match rx.recv_timeout(std::time::Duration::from_millis(0)) {
            Ok(event) => {
                match event {
                    AppEvent::Exit => break,
                    AppEvent::Crash(msg) => {
                        return Err(color_eyre::eyre::eyre!(msg));
                    }
                    event => {
                        if let Some(event) = app.event(&event) {
                            tx.send(event)?;
                        }
                    }
                }
                true
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => false,
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
        };

        if updated {
            render(&mut terminal, &mut app)?;
        }
    }
    Ok(())
}

fn handle_early_exit_flags(args: &Args) -> Result<Option<()>> {
    if args.write_config {
        match ConfigManager::new(APP_NAME) {
            Ok(config) => match config.write_default_config(args.force) {
                Ok(path) => {
                    println!("Config written to {}", path.display());
                    return Ok(Some(()));
                }
                Err(e) => {
                    eprintln!("Error writing config: {}", e);
                    std::process::exit(1);
                }
            },
            Err(e) => {
                eprintln!("Error initializing config manager: {}", e);
                std::process::exit(1);
            }
        }
    }

    if args.clear_cache {
        match CacheManager::new(APP_NAME) {
            Ok(cache) => {
                if let Err(e) = cache.clear_all() {
                    eprintln!("Error clearing cache: {}", e);
                    std::process::exit(1);
                }
                println!("Cache cleared successfully");
                return Ok(Some(()));
            }
            Err(_e) => {
                println!("No cache to clear");
                return Ok(Some(()));
            }
        }
    }

    Ok(None)
}

fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(()) = handle_early_exit_flags(&args)? {
        return Ok(());
    }

    color_eyre::install()?;
    let terminal = ratatui::init();
    let result = run(terminal, &args);
    ratatui::restore();
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_flag_overrides_base_url() {
        let args = Args {
            server: Some("http://backend:9000".to_string()),
            config: None,
            debug: true,
            write_config: false,
            force: false,
            clear_cache: false,
        };
        let config = load_config(&args).unwrap();
        assert_eq!(config.backend.base_url, "http://backend:9000");
        assert!(config.debug.enabled);
    }
}
