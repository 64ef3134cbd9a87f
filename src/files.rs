//! File operations offered to an API layer.
//!
//! Rename and copy are built from whole-file reads and writes. Rename writes the new name
//! before deleting the old one, so a failure between the two steps leaves both names in
//! place.

use crate::bus::{Connector, Delay};
use crate::error::ErrorKind;
use crate::session::Session;
use alloc::string::String;
use alloc::vec::Vec;
use log::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub name: String,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchHits {
    /// Files whose name or contents contain the query.
    pub names: Vec<String>,
    /// Files whose contents could not be read.
    pub skipped: Vec<String>,
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|w| w == needle)
}

impl<C: Connector, DL: Delay + Clone> Session<C, DL> {
    pub fn list(&self) -> Result<Vec<String>, ErrorKind> {
        Ok(self.volume()?.list())
    }

    pub fn file_info(&self, name: &str) -> Result<FileInfo, ErrorKind> {
        let size = self.volume()?.size(name)?;
        Ok(FileInfo {
            name: String::from(name),
            size,
        })
    }

    pub fn read(&mut self, name: &str) -> Result<Vec<u8>, ErrorKind> {
        self.with_volume(|volume| volume.read(name))
    }

    /// Create or replace `name`. Content larger than the device is rejected before any I/O.
    pub fn write(&mut self, name: &str, content: &[u8]) -> Result<(), ErrorKind> {
        let capacity = self.geometry().capacity();
        self.with_volume(|volume| {
            if content.len() > capacity {
                warn!(
                    "Write of {} bytes to {} exceeds capacity {}",
                    content.len(),
                    name,
                    capacity
                );
                return Err(ErrorKind::OutOfSpace);
            }
            volume.write(name, content)
        })
    }

    pub fn delete(&mut self, name: &str) -> Result<(), ErrorKind> {
        self.with_volume(|volume| volume.remove(name))
    }

    /// Move `old` to `new`. Not atomic: the contents are written under `new` first, then
    /// `old` is deleted.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<(), ErrorKind> {
        self.with_volume(|volume| {
            let content = volume.read(old)?;
            if volume.exists(new) {
                return Err(ErrorKind::AlreadyExists);
            }
            volume.write(new, &content)?;
            volume.remove(old)
        })?;
        info!("Renamed {} to {}", old, new);
        Ok(())
    }

    pub fn copy(&mut self, name: &str, new_name: &str) -> Result<(), ErrorKind> {
        self.with_volume(|volume| {
            let content = volume.read(name)?;
            if volume.exists(new_name) {
                return Err(ErrorKind::AlreadyExists);
            }
            volume.write(new_name, &content)
        })?;
        debug!("Copied {} to {}", name, new_name);
        Ok(())
    }

    /// Delete every name, carrying on past failures. Outcomes are in input order.
    pub fn batch_delete<S: AsRef<str>>(
        &mut self,
        names: &[S],
    ) -> Vec<(String, Result<(), ErrorKind>)> {
        names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                (String::from(name), self.delete(name))
            })
            .collect()
    }

    pub fn search(&mut self, query: &str) -> Result<SearchHits, ErrorKind> {
        let mut hits = SearchHits::default();
        for name in self.list()? {
            if name.contains(query) {
                hits.names.push(name);
                continue;
            }
            match self.read(&name) {
                Ok(content) if contains(&content, query.as_bytes()) => hits.names.push(name),
                Ok(_) => {}
                Err(ErrorKind::Transport) => return Err(ErrorKind::Transport),
                Err(e) => {
                    warn!("Search skipped {}: {}", name, e);
                    hits.skipped.push(name);
                }
            }
        }
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::tests_util::*;
    use alloc::string::ToString;
    use alloc::vec;

    #[test]
    fn test_write_then_read() {
        init();
        let (mut session, _, _) = make_session(&Config::default());
        let txt = rust_counter_strings::generate(2000);
        session.write("test.txt", txt.as_bytes()).unwrap();
        assert_eq!(session.read("test.txt").unwrap(), txt.as_bytes());
        session.write("test.txt", b"").unwrap();
        assert!(session.read("test.txt").unwrap().is_empty());
        assert_eq!(session.list().unwrap(), vec!["test.txt".to_string()]);
    }

    #[test]
    fn test_write_page_transactions() {
        init();
        let (mut session, eeprom, delay) = make_session(&Config::default());
        eeprom.clear_transactions();
        let before = delay.count();
        session.write("one", &[0u8; 10]).unwrap();
        // A single head record of 82 bytes spans two pages.
        let writes = eeprom
            .transactions()
            .into_iter()
            .filter(|t| matches!(t, Transaction::Write { .. }))
            .count();
        assert_eq!(writes, 2);
        assert_eq!(delay.count() - before, 2);
    }

    #[test]
    fn test_delete() {
        init();
        let (mut session, _, _) = make_session(&Config::default());
        session.write("to_delete.txt", b"bye").unwrap();
        session.delete("to_delete.txt").unwrap();
        assert_eq!(session.read("to_delete.txt"), Err(ErrorKind::NoEntry));
        assert_eq!(session.delete("to_delete.txt"), Err(ErrorKind::NoEntry));
        assert_eq!(ErrorKind::NoEntry.status_code(), 404);
    }

    #[test]
    fn test_rename() {
        init();
        let (mut session, _, _) = make_session(&Config::default());
        session.write("old_name.txt", b"rename me").unwrap();
        session.rename("old_name.txt", "new_name.txt").unwrap();
        assert_eq!(session.read("new_name.txt").unwrap(), b"rename me");
        assert_eq!(session.read("old_name.txt"), Err(ErrorKind::NoEntry));
        assert_eq!(
            session.rename("old_name.txt", "other.txt"),
            Err(ErrorKind::NoEntry)
        );
    }

    #[test]
    fn test_rename_conflict_changes_nothing() {
        init();
        let (mut session, _, _) = make_session(&Config::default());
        session.write("a", b"aaa").unwrap();
        session.write("b", b"bbb").unwrap();
        assert_eq!(session.rename("a", "b"), Err(ErrorKind::AlreadyExists));
        assert_eq!(session.read("a").unwrap(), b"aaa");
        assert_eq!(session.read("b").unwrap(), b"bbb");
        assert_eq!(ErrorKind::AlreadyExists.status_code(), 400);
    }

    #[test]
    fn test_rename_interrupted_leaves_both() {
        init();
        let (mut session, eeprom, _) = make_session(&Config::default());
        session.write("a", b"contents").unwrap();
        // New head lands (two pages), releasing the old head does not.
        eeprom.fail_writes_after(2);
        assert_eq!(session.rename("a", "b"), Err(ErrorKind::Transport));
        assert!(!session.status().connected);

        eeprom.heal();
        session.reconnect().unwrap();
        assert_eq!(session.read("a").unwrap(), b"contents");
        assert_eq!(session.read("b").unwrap(), b"contents");
    }

    #[test]
    fn test_copy() {
        init();
        let (mut session, _, _) = make_session(&Config::default());
        session.write("src", b"copy me").unwrap();
        session.copy("src", "dst").unwrap();
        assert_eq!(session.read("src").unwrap(), b"copy me");
        assert_eq!(session.read("dst").unwrap(), b"copy me");
        assert_eq!(session.copy("src", "dst"), Err(ErrorKind::AlreadyExists));
        assert_eq!(session.copy("missing", "x"), Err(ErrorKind::NoEntry));
    }

    #[test]
    fn test_capacity_checks() {
        init();
        let (mut session, eeprom, _) = make_session(&Config::default());
        eeprom.clear_transactions();
        let too_big = vec![b'x'; 32769];
        assert_eq!(session.write("large.txt", &too_big), Err(ErrorKind::OutOfSpace));
        assert!(eeprom.transactions().is_empty());
        assert_eq!(ErrorKind::OutOfSpace.status_code(), 500);

        // Within the declared capacity but past what the filesystem can hold.
        let full = vec![b'x'; 32768];
        assert_eq!(session.write("large.txt", &full), Err(ErrorKind::OutOfSpace));
        assert!(session.status().mounted);
    }

    #[test]
    fn test_unavailable_session() {
        init();
        let config = Config::default();
        let eeprom = RamEeprom::new(&config);
        let mut session =
            Session::new(config, eeprom.connector(), CountingDelay::default()).unwrap();
        assert_eq!(session.list(), Err(ErrorKind::Disconnected));
        assert_eq!(session.write("a", b"1"), Err(ErrorKind::Disconnected));
        assert_eq!(ErrorKind::Disconnected.status_code(), 503);

        session.connect().unwrap();
        assert_eq!(session.read("a"), Err(ErrorKind::NotMounted));
    }

    #[test]
    fn test_batch_delete() {
        init();
        let (mut session, _, _) = make_session(&Config::default());
        session.write("a", b"1").unwrap();
        session.write("c", b"3").unwrap();
        let outcomes = session.batch_delete(&["a", "b", "c"]);
        assert_eq!(
            outcomes,
            vec![
                ("a".to_string(), Ok(())),
                ("b".to_string(), Err(ErrorKind::NoEntry)),
                ("c".to_string(), Ok(())),
            ]
        );
        assert!(session.list().unwrap().is_empty());
    }

    #[test]
    fn test_search_and_info() {
        init();
        let (mut session, _, _) = make_session(&Config::default());
        session.write("notes.txt", b"nothing here").unwrap();
        session.write("log", b"sensor reading 42").unwrap();
        session.write("other", b"plain").unwrap();

        let hits = session.search("42").unwrap();
        assert_eq!(hits.names, vec!["log".to_string()]);
        let hits = session.search("notes").unwrap();
        assert_eq!(hits.names, vec!["notes.txt".to_string()]);
        assert!(hits.skipped.is_empty());

        assert_eq!(
            session.file_info("log").unwrap(),
            FileInfo {
                name: "log".to_string(),
                size: 17
            }
        );
        assert_eq!(session.file_info("nope"), Err(ErrorKind::NoEntry));
    }

    #[test]
    fn test_search_reports_unreadable_files() {
        init();
        let (mut session, eeprom, _) = make_session(&Config::default());
        session.write("good", b"needle in here").unwrap();
        session.write("bad", &[4u8; 24]).unwrap();

        // Flip the first inline byte of "bad".
        let pos = eeprom
            .memory()
            .windows(24)
            .position(|w| w.iter().all(|b| *b == 4))
            .unwrap();
        eeprom.poke(pos, &[5u8]);

        let hits = session.search("needle").unwrap();
        assert_eq!(hits.names, vec!["good".to_string()]);
        assert_eq!(hits.skipped, vec!["bad".to_string()]);
        assert!(session.status().mounted);

        // A name match needs no read.
        let hits = session.search("ba").unwrap();
        assert_eq!(hits.names, vec!["bad".to_string()]);
        assert!(hits.skipped.is_empty());
    }
}
