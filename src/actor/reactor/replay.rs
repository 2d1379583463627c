//! Recording of dispatched events, one RON value per line, and replaying
//! them into a fresh reactor.
//!
//! The first line of a recording is the config the reactor started with.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use anyhow::Context;
#[cfg(test)]
use tempfile::NamedTempFile;
use tracing::warn;

use super::{Event, Reactor, Request};
use crate::actor;
use crate::common::config::Config;

pub struct Record {
    file: Option<File>,
    #[cfg(test)]
    temp: Option<NamedTempFile>,
}

impl Record {
    pub fn new(path: Option<&Path>) -> anyhow::Result<Self> {
        let file = match path {
            Some(path) => Some(
                File::create(path)
                    .with_context(|| format!("creating recording {}", path.display()))?,
            ),
            None => None,
        };
        Ok(Self {
            file,
            #[cfg(test)]
            temp: None,
        })
    }

    /// A recorder that drops everything.
    pub fn none() -> Self {
        Self {
            file: None,
            #[cfg(test)]
            temp: None,
        }
    }

    #[cfg(test)]
    pub fn new_for_test(temp: NamedTempFile) -> Self { Self { file: None, temp: Some(temp) } }

    fn file(&mut self) -> Option<&mut File> {
        #[cfg(test)]
        return self.file.as_mut().or(self.temp.as_mut().map(|temp| temp.as_file_mut()));
        #[cfg(not(test))]
        self.file.as_mut()
    }

    pub(super) fn start(&mut self, config: &Config) {
        let Some(file) = self.file() else { return };
        let result = ron::ser::to_string(config)
            .map_err(anyhow::Error::from)
            .and_then(|line| writeln!(file, "{line}").map_err(anyhow::Error::from));
        if let Err(err) = result {
            warn!(%err, "recording stopped");
            self.stop();
        }
    }

    pub(super) fn on_event(&mut self, event: &Event) {
        let Some(file) = self.file() else { return };
        let result = ron::ser::to_string(event)
            .map_err(anyhow::Error::from)
            .and_then(|line| writeln!(file, "{line}").map_err(anyhow::Error::from));
        if let Err(err) = result {
            warn!(%err, "recording stopped");
            self.stop();
        }
    }

    fn stop(&mut self) {
        self.file = None;
        #[cfg(test)]
        {
            self.temp = None;
        }
    }
}

/// Feeds a recording through a new reactor, handing every request it makes
/// to `on_request`. Returns the reactor in its final state.
pub fn replay(path: &Path, mut on_request: impl FnMut(Request)) -> anyhow::Result<Reactor> {
    let file = File::open(path).with_context(|| format!("opening recording {}", path.display()))?;
    let mut lines = BufReader::new(file).lines();
    let config: Config = ron::de::from_str(&lines.next().context("empty recording")??)
        .context("reading recorded config")?;
    let (tx, mut rx) = actor::channel();
    let mut reactor = Reactor::new(config, Record::none(), tx);
    for (number, line) in lines.enumerate() {
        let event: Event = ron::de::from_str(&line?)
            .with_context(|| format!("reading event on line {}", number + 2))?;
        reactor.handle_event(event);
        while let Ok((_span, request)) = rx.try_recv() {
            on_request(request);
        }
    }
    Ok(reactor)
}
