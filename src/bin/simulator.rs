use perkins_ime::core::unifier::unify;
use perkins_ime::profile::ProfileRecord;
use perkins_ime::{BrailleEngine, EmitError, Host, Position};
use perkins_ime::core::types::ModeChange;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use std::time::Instant;

/// Writes host-protocol lines to stdout and keeps an append-only cursor
/// so the engine can maintain its overlay.
struct StdoutHost {
    cursor: Position,
}

impl Host for StdoutHost {
    fn emit(&mut self, text: &str, dots: &str) -> Result<Position, EmitError> {
        let pos = self.cursor;
        println!("COMMIT_TEXT {text} {dots}");
        io::stdout()
            .flush()
            .map_err(|e| EmitError::Host(e.to_string()))?;
        self.cursor.col += text.chars().count() as u32;
        Ok(pos)
    }

    fn mode_changed(&mut self, change: &ModeChange) {
        println!("MODE_CHANGED {} {}", change.from.as_str(), change.to.as_str());
    }
}

fn load_profiles(paths: &[String]) -> HashMap<String, Vec<ProfileRecord>> {
    let mut profiles: HashMap<String, Vec<ProfileRecord>> = HashMap::new();
    for path in paths {
        let file = match File::open(Path::new(path)) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "skipping unreadable profile");
                continue;
            }
        };
        match serde_json::from_reader::<_, ProfileRecord>(BufReader::new(file)) {
            Ok(record) => profiles.entry(record.system_id.clone()).or_default().push(record),
            Err(e) => tracing::warn!(path = %path, error = %e, "skipping unparseable profile"),
        }
    }
    profiles
}

fn main() -> io::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .init();

    let paths: Vec<String> = std::env::args().skip(1).collect();
    let profiles = load_profiles(&paths);
    let tables = unify(&profiles);
    tracing::info!(
        cells = tables.cells.len(),
        indicators = tables.indicators.len(),
        multi_cell = tables.multi_cell.len(),
        discarded = tables.discarded,
        "profiles unified"
    );

    let mut engine = BrailleEngine::new(tables);
    let mut host = StdoutHost {
        cursor: Position { line: 0, col: 0 },
    };

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let input = line?;
        // A command arriving after the quiescence window closes the chord.
        engine.poll(Instant::now(), &mut host);

        let parts: Vec<&str> = input.split_whitespace().collect();
        match parts.first().copied().unwrap_or("") {
            "DOT" => {
                let dot: u8 = parts.get(1).and_then(|s| s.parse().ok()).unwrap_or(255);
                engine.press(dot, Instant::now(), &mut host);
            }
            "FLUSH" => engine.flush_input(&mut host),
            "CANCEL" => engine.cancel_input(),
            "RESET" => engine.reset(),
            "TIMEOUT" => {
                if let Some(ms) = parts.get(1).and_then(|s| s.parse().ok()) {
                    engine.set_chord_timeout(std::time::Duration::from_millis(ms));
                }
            }
            "MODE" => println!("CURRENT_MODE {}", engine.current_mode().as_str()),
            "TOGGLE_MODE" => println!("CURRENT_MODE {}", engine.toggle_mode().as_str()),
            "TOGGLE_OVERLAY" => println!("OVERLAY_VISIBLE {}", engine.toggle_overlay()),
            "OVERLAY" => {
                let line_no: u32 = parts.get(1).and_then(|s| s.parse().ok()).unwrap_or(0);
                match engine.overlay().line_text(line_no) {
                    Some(text) => println!("OVERLAY_LINE {line_no} {text}"),
                    None => println!("OVERLAY_LINE {line_no}"),
                }
            }
            "EXIT" => break,
            "" => {}
            other => tracing::warn!(command = other, "unknown command"),
        }
        io::stdout().flush()?;
    }
    Ok(())
}
