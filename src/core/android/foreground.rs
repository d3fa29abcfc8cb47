use crate::core::cmd::run_async;
use memchr::{memchr, memmem};

const DUMPSYS_BIN: &str = "/system/bin/dumpsys";

/// Package currently holding the resumed activity, if any.
pub async fn foreground_package() -> anyhow::Result<Option<String>> {
    let out = match run_async(DUMPSYS_BIN, &["activity", "activities"], 1000).await {
        Ok(o) => o,
        Err(e) => {
            tracing::debug!(target: "scened::dumpsys", "dumpsys activity timeout: {:?}", e);
            return Ok(None);
        }
    };

    Ok(parse_resumed_package(&out.stdout))
}

/// Scan for the `ResumedActivity` line and pull the `u0 <pkg>/<activity>`
/// component out of it without allocating for the bulk of the dump.
fn parse_resumed_package(data: &[u8]) -> Option<String> {
    let resumed = memmem::Finder::new(b"ResumedActivity");
    let mut pos = 0;

    while let Some(offset) = resumed.find(&data[pos..]) {
        pos += offset;

        let line_start = data[..pos]
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |p| p + 1);
        let line_end = memchr(b'\n', &data[pos..]).map_or(data.len(), |p| pos + p);

        if let Some(pkg) = package_from_line(&data[line_start..line_end]) {
            return Some(pkg);
        }
        pos = line_end + 1;
        if pos >= data.len() {
            break;
        }
    }
    None
}

fn package_from_line(line: &[u8]) -> Option<String> {
    let user = memmem::Finder::new(b"u0 ");
    let start = user.find(line)? + 3;
    let rest = &line[start..];
    let slash = memchr(b'/', rest)?;
    let pkg = &rest[..slash];

    // Component names always carry a dotted package; anything else is a
    // stray match inside the dump.
    if memchr(b'.', pkg).is_some() {
        Some(String::from_utf8_lossy(pkg).trim().to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_resumed_component() {
        let dump = b"  mFocusedWindow=Window{abc}\n\
            topResumedActivity=ActivityRecord{1a2b u0 com.example.game/.MainActivity t42}\n\
            mLastPausedActivity=ActivityRecord{9f u0 com.android.launcher/.Home t1}\n";
        assert_eq!(
            parse_resumed_package(dump),
            Some("com.example.game".to_string())
        );
    }

    #[test]
    fn skips_lines_without_component() {
        let dump = b"ResumedActivity: none\n\
            ResumedActivity: ActivityRecord{77 u0 com.example.reader/.Reader t7}\n";
        assert_eq!(
            parse_resumed_package(dump),
            Some("com.example.reader".to_string())
        );
    }

    #[test]
    fn empty_dump_yields_none() {
        assert_eq!(parse_resumed_package(b""), None);
        assert_eq!(parse_resumed_package(b"no activities here\n"), None);
    }
}
