// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Testing utilities for the certification harness

pub mod capture;
pub mod test_info;

pub use capture::{CaptureBuilder, PacketBuilder};
pub use test_info::TestInfoBuilder;

use std::path::Path;
use tracing::debug;

/// Fixture which runs the test with a scratch directory. The directory is
/// removed afterwards, also when the test panics.
///
/// # Panics
///
/// * If the directory can not be created
/// * If the provided function / closure panics
pub fn with_scratch_dir<F: FnOnce(&Path) -> T, T>() -> impl FnOnce(F) -> T {
    move |f: F| {
        #[allow(clippy::expect_used)] // a test without its directory can not run
        let dir = tempfile::Builder::new()
            .prefix("thread-cert-")
            .tempdir()
            .expect("failed to create scratch directory");
        debug!("scratch directory {}", dir.path().display());
        f(dir.path())
    }
}

/// Fixture which writes a test info document and its capture into a scratch
/// directory, and runs the test with the path of the test info document.
///
/// # Panics
///
/// * If the files can not be written
/// * If the provided function / closure panics
pub fn with_test_files<F: FnOnce(&Path) -> T, T>(
    info: TestInfoBuilder,
    capture: CaptureBuilder,
) -> impl FnOnce(F) -> T {
    move |f: F| {
        with_scratch_dir()(move |dir: &Path| {
            let pcap = info.pcap_name();
            #[allow(clippy::expect_used)]
            capture
                .write(&dir.join(&pcap))
                .expect("failed to write capture");
            let path = dir.join("test_info.json");
            #[allow(clippy::expect_used)]
            info.write(&path).expect("failed to write test info");
            f(&path)
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn scratch_dir_is_removed() {
        let kept = with_scratch_dir()(|dir: &Path| {
            assert!(dir.is_dir());
            dir.to_path_buf()
        });
        assert!(!kept.exists());
    }

    #[test]
    fn test_files_are_written() {
        let info = TestInfoBuilder::new("Cert_Test").node(1, "LEADER", "166e0a0000000001");
        let capture = CaptureBuilder::new().packet(PacketBuilder::wpan(0.5));
        with_test_files(info, capture)(|path: &Path| {
            assert!(path.is_file());
            assert!(path.with_file_name("Cert_Test.json").is_file());
        });
    }
}
