//! Platforms command implementation.

use blobstow_core::Platform;

/// Lines printed by the platforms command, host platform marked.
fn platform_lines(host: Option<Platform>) -> Vec<String> {
    Platform::all()
        .into_iter()
        .map(|platform| {
            if Some(platform) == host {
                format!("{platform} (host)")
            } else {
                platform.to_string()
            }
        })
        .collect()
}

/// Prints every supported `os/arch` pair.
pub fn run() {
    for line in platform_lines(Platform::host()) {
        println!("{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_lines_marks_host() {
        let lines = platform_lines(Some(Platform::default()));
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "linux/amd64 (host)");
        assert_eq!(lines[1], "linux/arm64");
        assert!(lines.iter().filter(|l| l.ends_with("(host)")).count() == 1);
    }

    #[test]
    fn test_platform_lines_without_host() {
        let lines = platform_lines(None);
        assert!(lines.iter().all(|l| !l.contains("host")));
        assert!(lines.contains(&"darwin/arm64".to_string()));
    }
}
