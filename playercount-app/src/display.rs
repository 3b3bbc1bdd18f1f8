//! Terminal rendering of session events.

use std::io::{self, Write};

use chrono::Local;
use playercount_sdk::chat::ChatLog;
use playercount_sdk::frame::PlayerSnapshot;
use playercount_sdk::{ChatEntry, Event};

#[derive(Debug, PartialEq)]
struct Shown {
    official: i64,
    total: i64,
    players: Vec<String>,
}

pub struct Display<W: Write> {
    out: W,
    chat: ChatLog,
    timestamps: bool,
    /// Last snapshot printed, positions aside.
    last_shown: Option<Shown>,
}

impl<W: Write> Display<W> {
    pub fn new(out: W, max_chat_messages: usize) -> Self {
        Self {
            out,
            chat: ChatLog::new(max_chat_messages),
            timestamps: true,
            last_shown: None,
        }
    }

    pub fn without_timestamps(mut self) -> Self {
        self.timestamps = false;
        self
    }

    pub fn chat(&self) -> &ChatLog {
        &self.chat
    }

    pub fn handle(&mut self, event: &Event) -> io::Result<()> {
        match event {
            Event::Connecting => self.status("connecting to relay"),
            Event::Connected => self.status("connected"),
            Event::Registered { identity } => {
                let name = identity.username.as_deref().unwrap_or("anonymous");
                self.status(&format!("logged in as {name}"))
            }
            Event::Disconnected { reason } => {
                self.last_shown = None;
                self.status(&format!("disconnected ({reason}), reconnecting"))
            }
            Event::Count(snapshot) => self.counts(snapshot),
            Event::Chat(entry) => {
                self.chat.push(entry.clone());
                self.chat_line(entry)
            }
            Event::Recovery(entries) => {
                if entries.is_empty() {
                    return Ok(());
                }
                writeln!(self.out, "--- recent chat ---")?;
                for entry in entries {
                    writeln!(self.out, "{}: {}", entry.username, entry.message)?;
                }
                writeln!(self.out, "---")?;
                self.chat.extend(entries.iter().cloned());
                Ok(())
            }
            // Already logged by the session.
            Event::DecodeFailed { .. } => Ok(()),
        }
    }

    fn counts(&mut self, snapshot: &PlayerSnapshot) -> io::Result<()> {
        // Positions change every frame; only counts and roster are printed.
        let shown = Shown {
            official: snapshot.official_count,
            total: snapshot.total_count,
            players: snapshot.players.iter().map(|p| p.username.clone()).collect(),
        };
        if self.last_shown.as_ref() == Some(&shown) {
            return Ok(());
        }
        self.last_shown = Some(shown);

        writeln!(self.out, "Official: {}", snapshot.official_count)?;
        writeln!(
            self.out,
            "Logged in: {} / {}",
            snapshot.logged_in_count(),
            snapshot.total_count
        )?;
        if !snapshot.players.is_empty() {
            let names: Vec<&str> = snapshot.players.iter().map(|p| p.username.as_str()).collect();
            writeln!(self.out, "Players: {}", names.join(", "))?;
        }
        self.out.flush()
    }

    fn chat_line(&mut self, entry: &ChatEntry) -> io::Result<()> {
        if self.timestamps {
            write!(self.out, "[{}] ", Local::now().format("%H:%M:%S"))?;
        }
        writeln!(self.out, "{}: {}", entry.username, entry.message)?;
        self.out.flush()
    }

    fn status(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "* {text}")?;
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use playercount_sdk::frame::Player;
    use playercount_sdk::identity::Identity;

    use super::*;

    fn display() -> Display<Vec<u8>> {
        Display::new(Vec::new(), 3).without_timestamps()
    }

    fn output(display: &Display<Vec<u8>>) -> String {
        String::from_utf8(display.out.clone()).unwrap()
    }

    fn snapshot(official: i64, total: i64, names: &[&str]) -> PlayerSnapshot {
        PlayerSnapshot {
            official_count: official,
            total_count: total,
            players: names
                .iter()
                .map(|n| Player {
                    username: n.to_string(),
                })
                .collect(),
            positions: Vec::new(),
        }
    }

    #[test]
    fn test_count_lines() {
        let mut d = display();
        d.handle(&Event::Count(snapshot(120, 7, &["alice", "bob"])))
            .unwrap();
        assert_eq!(
            output(&d),
            "Official: 120\nLogged in: 2 / 7\nPlayers: alice, bob\n"
        );
    }

    #[test]
    fn test_unchanged_counts_are_not_repeated() {
        let mut d = display();
        d.handle(&Event::Count(snapshot(5, 1, &[]))).unwrap();
        d.handle(&Event::Count(snapshot(5, 1, &[]))).unwrap();
        d.handle(&Event::Count(snapshot(6, 1, &[]))).unwrap();
        assert_eq!(
            output(&d),
            "Official: 5\nLogged in: 0 / 1\nOfficial: 6\nLogged in: 0 / 1\n"
        );
    }

    #[test]
    fn test_roster_change_with_same_counts_is_printed() {
        let mut d = display();
        d.handle(&Event::Count(snapshot(10, 2, &["alice"]))).unwrap();
        d.handle(&Event::Count(snapshot(10, 2, &["bob"]))).unwrap();
        assert_eq!(
            output(&d),
            "Official: 10\nLogged in: 1 / 2\nPlayers: alice\n\
             Official: 10\nLogged in: 1 / 2\nPlayers: bob\n"
        );
    }

    #[test]
    fn test_chat_is_printed_and_bounded() {
        let mut d = display();
        d.handle(&Event::Recovery(vec![
            ChatEntry::new("a", "1"),
            ChatEntry::new("b", "2"),
        ]))
        .unwrap();
        d.handle(&Event::Chat(ChatEntry::new("c", "3"))).unwrap();
        d.handle(&Event::Chat(ChatEntry::new("d", "4"))).unwrap();

        let kept: Vec<_> = d.chat().iter().map(|e| e.username.as_str()).collect();
        assert_eq!(kept, vec!["b", "c", "d"]);
        assert_eq!(
            output(&d),
            "--- recent chat ---\na: 1\nb: 2\n---\nc: 3\nd: 4\n"
        );
    }

    #[test]
    fn test_status_lines() {
        let mut d = display();
        d.handle(&Event::Registered {
            identity: Identity {
                logged_in: true,
                username: Some("alice".into()),
            },
        })
        .unwrap();
        d.handle(&Event::Disconnected {
            reason: "connection closed".into(),
        })
        .unwrap();
        assert_eq!(
            output(&d),
            "* logged in as alice\n* disconnected (connection closed), reconnecting\n"
        );
    }
}
