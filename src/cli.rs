//! Host console - commands an operator (or a host patch piping stdin) can
//! send to the surface

use anyhow::{bail, Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::ohm64::layout::BUTTON_COUNT;
use crate::surface::Surface;

/// One parsed console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCommand {
    /// `button <id> <0|1>`
    Button { id: u32, value: bool },
    /// `bulk <64 x 0|1>`
    Bulk(Vec<bool>),
    /// `policy <name>`
    Policy(String),
    Clear,
    FactoryReset,
    Sync,
    Show,
    Help,
    Exit,
}

pub const HELP: &str = "\
button <id> <0|1>     send a button event (0-63)
bulk <64 x 0|1>       set every LED at once, then sync
policy <name>         toggle | trigger | blink
clear                 all off, cancel blinks, sync
reset                 send the factory-reset frame
sync                  resend the full LED frame
show                  print the grid
exit                  quit";

fn parse_flag(token: &str) -> Result<bool> {
    match token {
        "0" | "off" | "false" => Ok(false),
        "1" | "on" | "true" => Ok(true),
        other => bail!("expected 0 or 1, got '{}'", other),
    }
}

impl HostCommand {
    /// Parse one line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let mut tokens = line.split_whitespace();
        let Some(verb) = tokens.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = tokens.collect();

        let command = match (verb.to_lowercase().as_str(), args.as_slice()) {
            ("button", [id, value]) => HostCommand::Button {
                id: id
                    .parse()
                    .with_context(|| format!("invalid button id '{}'", id))?,
                value: parse_flag(value)?,
            },
            ("button", _) => bail!("usage: button <id> <0|1>"),
            ("bulk", values) => {
                // Accept "0 1 0 ..." as well as a packed "0101..."
                let flags = if let [packed] = values {
                    packed
                        .chars()
                        .map(|c| parse_flag(c.encode_utf8(&mut [0; 4])))
                        .collect::<Result<Vec<_>>>()?
                } else {
                    values
                        .iter()
                        .map(|v| parse_flag(v))
                        .collect::<Result<Vec<_>>>()?
                };
                HostCommand::Bulk(flags)
            }
            ("policy", [name]) => HostCommand::Policy(name.to_string()),
            ("policy", _) => bail!("usage: policy <toggle|trigger|blink>"),
            ("clear", []) => HostCommand::Clear,
            ("reset", []) => HostCommand::FactoryReset,
            ("sync", []) => HostCommand::Sync,
            ("show", []) => HostCommand::Show,
            ("help" | "?", []) => HostCommand::Help,
            ("exit" | "quit", []) => HostCommand::Exit,
            (other, _) => bail!("unknown command '{}' (try 'help')", other),
        };

        Ok(Some(command))
    }
}

impl HostCommand {
    /// Run the command against the surface. Rejected commands are logged
    /// and leave the surface untouched. Returns false on `Exit`.
    pub fn apply(self, surface: &Surface) -> bool {
        let result = match self {
            HostCommand::Button { id, value } => surface.on_button_event(id, value),
            HostCommand::Bulk(values) => surface.bulk_update(&values),
            HostCommand::Policy(name) => surface.set_policy(&name).map(|policy| {
                info!("Input policy is now {}", policy);
            }),
            HostCommand::Clear => {
                surface.clear();
                Ok(())
            }
            HostCommand::FactoryReset => {
                surface.factory_reset();
                Ok(())
            }
            HostCommand::Sync => {
                surface.sync();
                Ok(())
            }
            HostCommand::Show => {
                println!("policy: {}", surface.policy());
                println!("{}", render_grid(&surface.snapshot()));
                Ok(())
            }
            HostCommand::Help => {
                println!("{}", HELP);
                Ok(())
            }
            HostCommand::Exit => return false,
        };

        if let Err(e) = result {
            warn!("Rejected host command: {}", e);
        }
        true
    }
}

/// Render the grid as 8 rows of `#`/`.`, id 0 top-left
pub fn render_grid(states: &[bool; BUTTON_COUNT]) -> String {
    states
        .chunks(8)
        .map(|row| {
            row.iter()
                .map(|on| if *on { "#" } else { "." })
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Blocking REPL; run it on a blocking thread. Returns when the user exits,
/// stdin closes, or the receiving side is gone.
pub fn run_repl(tx: mpsc::Sender<HostCommand>) -> Result<()> {
    let mut rl = DefaultEditor::new()?;

    loop {
        match rl.readline("ohm64> ") {
            Ok(line) => {
                let _ = rl.add_history_entry(line.as_str());
                match HostCommand::parse(&line) {
                    Ok(Some(HostCommand::Help)) => println!("{}", HELP),
                    Ok(Some(command)) => {
                        let exit = command == HostCommand::Exit;
                        if tx.blocking_send(command).is_err() || exit {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => println!("error: {:#}", e),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                let _ = tx.blocking_send(HostCommand::Exit);
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_button() {
        assert_eq!(
            HostCommand::parse("button 12 1").unwrap(),
            Some(HostCommand::Button { id: 12, value: true })
        );
        assert_eq!(
            HostCommand::parse("  BUTTON 70 off ").unwrap(),
            Some(HostCommand::Button { id: 70, value: false })
        );
        assert!(HostCommand::parse("button 12").is_err());
        assert!(HostCommand::parse("button x 1").is_err());
        assert!(HostCommand::parse("button 1 2").is_err());
    }

    #[test]
    fn test_parse_bulk_forms() {
        let spaced = format!("bulk {}", vec!["1"; 64].join(" "));
        assert_eq!(
            HostCommand::parse(&spaced).unwrap(),
            Some(HostCommand::Bulk(vec![true; 64]))
        );

        let packed = format!("bulk {}", "10".repeat(32));
        let Some(HostCommand::Bulk(values)) = HostCommand::parse(&packed).unwrap() else {
            panic!("expected bulk");
        };
        assert_eq!(values.len(), 64);
        assert!(values[0] && !values[1]);

        // length is checked by the surface, not the parser
        assert_eq!(
            HostCommand::parse("bulk 1 0 1").unwrap(),
            Some(HostCommand::Bulk(vec![true, false, true]))
        );
        assert!(HostCommand::parse("bulk 1 0 x").is_err());
    }

    #[test]
    fn test_parse_admin_commands() {
        assert_eq!(HostCommand::parse("clear").unwrap(), Some(HostCommand::Clear));
        assert_eq!(HostCommand::parse("reset").unwrap(), Some(HostCommand::FactoryReset));
        assert_eq!(HostCommand::parse("sync").unwrap(), Some(HostCommand::Sync));
        assert_eq!(HostCommand::parse("quit").unwrap(), Some(HostCommand::Exit));
        assert_eq!(
            HostCommand::parse("policy blink").unwrap(),
            Some(HostCommand::Policy("blink".to_string()))
        );
        assert_eq!(HostCommand::parse("   ").unwrap(), None);
        assert!(HostCommand::parse("clear now").is_err());
        assert!(HostCommand::parse("dance").is_err());
    }

    #[tokio::test]
    async fn test_apply_drives_surface() {
        use crate::board::InputPolicy;
        use crate::surface::SurfaceOptions;

        let (surface, mut rx) = Surface::new(SurfaceOptions::default()).unwrap();

        assert!(HostCommand::Policy("trigger".to_string()).apply(&surface));
        assert_eq!(surface.policy(), InputPolicy::Trigger);

        // rejected commands keep the loop running and change nothing
        assert!(HostCommand::Policy("strobe".to_string()).apply(&surface));
        assert!(HostCommand::Bulk(vec![true; 3]).apply(&surface));
        assert!(HostCommand::Button { id: 99, value: true }.apply(&surface));
        assert_eq!(surface.policy(), InputPolicy::Trigger);
        assert!(rx.try_recv().is_err());

        assert!(HostCommand::Button { id: 8, value: true }.apply(&surface));
        assert_eq!(rx.try_recv().unwrap().encode(), vec![144, 8, 1]);

        assert!(HostCommand::FactoryReset.apply(&surface));
        assert_eq!(rx.try_recv().unwrap().encode(), vec![240, 0, 1, 97, 2, 6, 247]);

        assert!(!HostCommand::Exit.apply(&surface));
    }

    #[test]
    fn test_render_grid() {
        let mut states = [false; BUTTON_COUNT];
        states[0] = true;
        states[63] = true;

        let grid = render_grid(&states);
        let rows: Vec<&str> = grid.lines().collect();
        assert_eq!(rows.len(), 8);
        assert_eq!(rows[0], "# . . . . . . .");
        assert_eq!(rows[7], ". . . . . . . #");
    }
}
