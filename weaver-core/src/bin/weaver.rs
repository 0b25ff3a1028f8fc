//! weaver - interactive fiction in the terminal.
//!
//! A thin line-based driver around [`GameSession`]: pick a theme, generate
//! the world, then read commands until the story ends.

use std::io::{self, BufRead, Write};

use weaver_core::{GameSession, SessionConfig, Theme};

#[tokio::main]
async fn main() -> io::Result<()> {
    if dotenvy::from_path("../.env").is_err() {
        let _ = dotenvy::dotenv();
    }
    env_logger::init();

    let theme = pick_theme()?;
    let config = SessionConfig::new().with_theme(theme);

    let mut session = match GameSession::new(config) {
        Ok(session) => session,
        Err(error) => {
            eprintln!("{error}");
            std::process::exit(1);
        }
    };

    println!("\nweaver - a {} story", theme.name());
    println!("Type `help` for commands, `quit` to leave.\n");
    println!("Spinning up your adventure...\n");

    match session.begin().await {
        Ok(response) => println!("{}\n", response.narrative),
        Err(error) => {
            eprintln!("{error}");
            std::process::exit(1);
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut line = String::new();

    while !session.is_over() {
        print!("> ");
        stdout.flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        let response = session.command(&line).await;
        println!("\n{}\n", response.narrative);
    }

    println!("Farewell.");
    Ok(())
}

/// Theme from the first CLI argument, or an interactive menu.
fn pick_theme() -> io::Result<Theme> {
    if let Some(arg) = std::env::args().nth(1) {
        let wanted = arg.to_lowercase().replace(['-', '_'], " ");
        if let Some(theme) = Theme::all()
            .into_iter()
            .find(|t| t.name().contains(wanted.trim()))
        {
            return Ok(theme);
        }
        eprintln!("Unknown theme `{arg}`.");
    }

    println!("Choose your story theme:");
    for (index, theme) in Theme::all().iter().enumerate() {
        println!("  {}. {}", index + 1, theme.name());
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut line = String::new();
    loop {
        print!("Enter your choice (1-6): ");
        stdout.flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(Theme::default());
        }
        if let Ok(choice) = line.trim().parse::<usize>() {
            if (1..=6).contains(&choice) {
                return Ok(Theme::all()[choice - 1]);
            }
        }
        println!("Invalid choice. Please enter a number 1-6.");
    }
}
