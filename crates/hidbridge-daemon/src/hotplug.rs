//! Hot-plug notifications for the input device directory
//!
//! New nodes are reported twice in practice: once on creation and again when
//! udev fixes up their permissions. Both are passed on; a node that cannot be
//! grabbed yet on creation usually can be after the attribute change.

use std::ffi::OsStr;
use std::os::fd::{AsFd, BorrowedFd};
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::sys::inotify::{AddWatchFlags, InitFlags, Inotify};

use crate::device::is_event_node;

/// Non-blocking inotify watch on one directory
pub struct HotplugWatch {
    inotify: Inotify,
    dir: PathBuf,
}

impl HotplugWatch {
    pub fn new(dir: &Path) -> nix::Result<Self> {
        let inotify = Inotify::init(InitFlags::IN_NONBLOCK | InitFlags::IN_CLOEXEC)?;
        inotify.add_watch(dir, AddWatchFlags::IN_CREATE | AddWatchFlags::IN_ATTRIB)?;

        tracing::debug!("Watching {} for new devices", dir.display());

        Ok(Self {
            inotify,
            dir: dir.to_path_buf(),
        })
    }

    /// Drain pending notifications, returning the event nodes they name
    pub fn read_paths(&self) -> nix::Result<Vec<PathBuf>> {
        match self.inotify.read_events() {
            Ok(events) => Ok(event_node_paths(
                &self.dir,
                events.iter().filter_map(|e| e.name.as_deref()),
            )),
            Err(Errno::EAGAIN) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}

impl AsFd for HotplugWatch {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.inotify.as_fd()
    }
}

fn event_node_paths<'a>(dir: &Path, names: impl Iterator<Item = &'a OsStr>) -> Vec<PathBuf> {
    names
        .map(|name| dir.join(name))
        .filter(|path| is_event_node(path))
        .collect()
}
