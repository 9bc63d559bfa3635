//! # Kernel Binding Interface
//!
//! The FUSE dispatch layer is an external collaborator: it turns kernel
//! upcalls into calls on [`FsFacade`] and must dispatch them one at a
//! time on a single thread. This module declares that seam and provides
//! the placeholder used when no dispatcher is linked into the build.

use std::path::Path;

use tracing::warn;

use crate::facade::FsFacade;
use crate::ports::BlockTransport;
use crate::FsError;

/// The dispatch loop contract between the facade and a kernel filesystem
/// driver. `run` blocks until the filesystem is unmounted; the caller
/// flushes and tears the session down afterwards.
pub trait KernelBinding {
    fn run<T: BlockTransport>(
        self,
        mount_point: &Path,
        fs: &mut FsFacade<T>,
    ) -> Result<(), FsError>;
}

/// Stand-in binding for builds without a kernel dispatcher.
///
/// Touches the root directory as a sanity check, reports that nothing
/// was mounted, and returns so the client can flush and exit cleanly.
pub struct NullBinding;

impl KernelBinding for NullBinding {
    fn run<T: BlockTransport>(
        self,
        mount_point: &Path,
        fs: &mut FsFacade<T>,
    ) -> Result<(), FsError> {
        fs.getattr("/")?;
        warn!(
            "[client] no kernel binding linked into this build; {} was not mounted",
            mount_point.display()
        );
        Ok(())
    }
}
