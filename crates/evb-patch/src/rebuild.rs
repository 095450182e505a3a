//! Rebuild a complete, individually-appliable diff for one `PatchInfo`.
//!
//! Real blob hashes are not needed for `patch -p1` application, so the
//! `index` lines use the placeholder hashes from spec.md §6.

use evb_core::{PatchFileStatus, PatchInfo};

const OLD_HASH: &str = "0000000";
const MID_HASH: &str = "1111111";
const NEW_HASH: &str = "2222222";

/// Rebuild a synthetic, self-contained unified diff for one file record.
pub fn rebuild_diff(patch: &PatchInfo) -> String {
    let mut out = String::new();

    match patch.status {
        PatchFileStatus::Added => {
            out.push_str(&format!(
                "diff --git a/{f} b/{f}\n",
                f = patch.filename
            ));
            out.push_str("new file mode 100644\n");
            out.push_str(&format!("index {OLD_HASH}..{MID_HASH} 100644\n"));
            out.push_str("--- /dev/null\n");
            out.push_str(&format!("+++ b/{}\n", patch.filename));
        }
        PatchFileStatus::Removed => {
            out.push_str(&format!(
                "diff --git a/{f} b/{f}\n",
                f = patch.filename
            ));
            out.push_str("deleted file mode 100644\n");
            out.push_str(&format!("index {MID_HASH}..{OLD_HASH} 100644\n"));
            out.push_str(&format!("--- a/{}\n", patch.filename));
            out.push_str("+++ /dev/null\n");
        }
        PatchFileStatus::Renamed => {
            let old = patch.old_filename.as_deref().unwrap_or(&patch.filename);
            out.push_str(&format!(
                "diff --git a/{old} b/{new}\n",
                new = patch.filename
            ));
            out.push_str("similarity index 100%\n");
            out.push_str(&format!("rename from {old}\n"));
            out.push_str(&format!("rename to {}\n", patch.filename));
            out.push_str(&format!("index {MID_HASH}..{NEW_HASH} 100644\n"));
            out.push_str(&format!("--- a/{old}\n"));
            out.push_str(&format!("+++ b/{}\n", patch.filename));
        }
        PatchFileStatus::Modified => {
            out.push_str(&format!(
                "diff --git a/{f} b/{f}\n",
                f = patch.filename
            ));
            out.push_str(&format!("index {MID_HASH}..{NEW_HASH} 100644\n"));
            out.push_str(&format!("--- a/{}\n", patch.filename));
            out.push_str(&format!("+++ b/{}\n", patch.filename));
        }
    }

    if !patch.patch_content.is_empty() {
        out.push_str(&patch.patch_content);
        if !out.ends_with('\n') {
            out.push('\n');
        }
    }

    out
}
