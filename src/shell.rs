use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::{io::Write, time::Duration};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};

use crate::{
    config::Credentials, controller::Controller, events::GenerationEvent,
    styles::StyleSelection,
};

const HELP: &str = "\
commands:
  cookies <U> <SRCHHPGUSR>   set the two Bing cookies
  validate                   check the cookies by building the provider
  env                        export the cookies to this process's environment
  models                     refresh the Ollama model list
  model <name|none>          pick an Ollama model for prompt enrichment
  styles                     list styles
  style <name|number|custom> pick a style
  custom [text]              override the style with free text (empty clears)
  count <1-4>                number of images to request
  generate <phrase>          start a generation (alias: gen)
  prev | next                browse the current images
  show                       reload the current image
  save                       save the current image
  state                      show the current settings
  help                       this text
  exit | quit                leave";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Cookies { u_cookie: String, srchhpgusr: String },
    Validate,
    Env,
    Models,
    Model(Option<String>),
    Styles,
    Style(String),
    Custom(String),
    Count(u8),
    Generate(String),
    Prev,
    Next,
    Show,
    Save,
    State,
    Help,
    Exit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Option<Command>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((w, r)) => (w, r.trim()),
            None => (line, ""),
        };
        let cmd = match word.to_ascii_lowercase().as_str() {
            "cookies" => {
                let mut parts = rest.split_whitespace();
                match (parts.next(), parts.next(), parts.next()) {
                    (Some(u), Some(s), None) => Command::Cookies {
                        u_cookie: u.to_string(),
                        srchhpgusr: s.to_string(),
                    },
                    _ => return Err("usage: cookies <U> <SRCHHPGUSR>".into()),
                }
            }
            "validate" => Command::Validate,
            "env" => Command::Env,
            "models" => Command::Models,
            "model" => match rest {
                "" => return Err("usage: model <name|none>".into()),
                r if r.eq_ignore_ascii_case("none") => Command::Model(None),
                r => Command::Model(Some(r.to_string())),
            },
            "styles" => Command::Styles,
            "style" if !rest.is_empty() => Command::Style(rest.to_string()),
            "style" => return Err("usage: style <name|number|custom>".into()),
            "custom" => Command::Custom(rest.to_string()),
            "count" => match rest.parse::<u8>() {
                Ok(n) if (1..=4).contains(&n) => Command::Count(n),
                _ => return Err("usage: count <1-4>".into()),
            },
            "generate" | "gen" => Command::Generate(rest.to_string()),
            "prev" | "previous" => Command::Prev,
            "next" => Command::Next,
            "show" => Command::Show,
            "save" => Command::Save,
            "state" => Command::State,
            "help" | "?" => Command::Help,
            "exit" | "quit" => Command::Exit,
            other => return Err(format!("unknown command '{other}', try 'help'")),
        };
        Ok(Some(cmd))
    }
}

/// Interactive loop. Commands run one at a time on this task; generation
/// events are drained between them.
pub async fn run(
    mut controller: Controller,
    mut events: mpsc::UnboundedReceiver<GenerationEvent>,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut spinner: Option<ProgressBar> = None;

    println!("bingen shell; type 'help' for commands");
    flush_status(&mut controller);
    print_prompt()?;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match Command::parse(&line) {
                    Ok(None) => {}
                    Ok(Some(Command::Exit)) => break,
                    Ok(Some(cmd)) => {
                        execute(&mut controller, cmd).await;
                        if controller.is_generating() && spinner.is_none() {
                            spinner = Some(start_spinner());
                        }
                    }
                    Err(msg) => println!("{msg}"),
                }
                flush_status(&mut controller);
                print_prompt()?;
            }
            Some(event) = events.recv() => {
                let terminal = event.is_terminal();
                if terminal {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                }
                controller.handle_event(event).await;
                flush_status(&mut controller);
                if terminal {
                    print_prompt()?;
                }
            }
        }
    }

    if controller.is_generating() {
        tracing::warn!("exiting while a generation is still running");
    }
    Ok(())
}

async fn execute(c: &mut Controller, cmd: Command) {
    match cmd {
        Command::Cookies { u_cookie, srchhpgusr } => {
            c.set_credentials(Credentials::new(u_cookie, srchhpgusr));
            println!("cookies set");
        }
        Command::Validate => {
            c.validate_credentials();
        }
        Command::Env => {
            c.update_environment();
        }
        Command::Models => {
            c.refresh_models().await;
            for m in c.models() {
                let mark = if Some(m.as_str()) == c.selected_model() { "*" } else { " " };
                println!(" {mark} {m}");
            }
        }
        Command::Model(name) => {
            c.select_model(name.as_deref());
        }
        Command::Styles => print_styles(c),
        Command::Style(input) => {
            if c.select_style(&input) {
                println!("style: {}", c.resolved_style());
            }
        }
        Command::Custom(text) => {
            c.set_custom_style(&text);
            println!("style: {}", c.resolved_style());
        }
        Command::Count(n) => {
            let n = c.set_image_count(n);
            println!("images per generation: {n}");
        }
        Command::Generate(phrase) => {
            c.generate(&phrase).await;
        }
        Command::Prev => {
            if !c.show_previous().await {
                println!("already at the first image");
            }
        }
        Command::Next => {
            if !c.show_next().await {
                println!("already at the last image");
            }
        }
        Command::Show => c.display_current().await,
        Command::Save => {
            c.save_current().await;
        }
        Command::State => print_state(c),
        Command::Help => println!("{HELP}"),
        Command::Exit => {}
    }
}

fn print_styles(c: &Controller) {
    let mut n = 1;
    for cat in c.catalog().categories() {
        println!("--- {} ---", cat.name);
        for s in &cat.styles {
            println!("  {n:>2}. {s}");
            n += 1;
        }
    }
}

fn print_state(c: &Controller) {
    let style = match c.style_selection() {
        StyleSelection::Catalog(s) => s.clone(),
        StyleSelection::Custom => "Custom".to_string(),
        StyleSelection::None => "-".to_string(),
    };
    let b = c.browser();
    println!("cookies:      {}", if c.credentials().is_complete() { "set" } else { "missing" });
    println!("model:        {}", c.selected_model().unwrap_or("None (Direct prompt)"));
    println!("style:        {style}");
    println!("custom style: {}", c.custom_style());
    println!("resolved:     {}", c.resolved_style());
    println!("count:        {}", c.image_count());
    println!("generating:   {}", c.is_generating());
    println!(
        "image:        {}{}{}",
        b.position_label(),
        if b.can_previous() { "  [prev]" } else { "" },
        if b.can_next() { "  [next]" } else { "" },
    );
    if let Some(info) = c.current_info() {
        println!("showing:      {info}");
    }
    println!("next save:    #{:04}", c.save_counter());
    println!("output:       {}", c.config().output_dir.display());
}

fn flush_status(c: &mut Controller) {
    for line in c.status_mut().take_unseen() {
        println!("{line}");
    }
}

fn print_prompt() -> std::io::Result<()> {
    print!("bingen> ");
    std::io::stdout().flush()
}

fn start_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} ({elapsed})") {
        pb.set_style(style);
    }
    pb.set_message("generating");
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(Command::parse("   "), Ok(None));
        assert_eq!(
            Command::parse("cookies abc def"),
            Ok(Some(Command::Cookies { u_cookie: "abc".into(), srchhpgusr: "def".into() }))
        );
        assert_eq!(Command::parse("gen  a red fox "), Ok(Some(Command::Generate("a red fox".into()))));
        assert_eq!(Command::parse("model none"), Ok(Some(Command::Model(None))));
        assert_eq!(
            Command::parse("model llama3:latest"),
            Ok(Some(Command::Model(Some("llama3:latest".into()))))
        );
        assert_eq!(Command::parse("style Film Noir"), Ok(Some(Command::Style("Film Noir".into()))));
        assert_eq!(Command::parse("custom"), Ok(Some(Command::Custom(String::new()))));
        assert_eq!(Command::parse("COUNT 3"), Ok(Some(Command::Count(3))));
        assert_eq!(Command::parse("quit"), Ok(Some(Command::Exit)));
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(Command::parse("count 5").is_err());
        assert!(Command::parse("count x").is_err());
        assert!(Command::parse("cookies only-one").is_err());
        assert!(Command::parse("style").is_err());
        assert!(Command::parse("model").is_err());
        assert!(Command::parse("paint").is_err());
    }
}
