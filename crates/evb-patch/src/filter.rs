use evb_core::PatchInfo;

/// Filter a parsed patch list by whether test files and/or source files
/// should be retained.
pub fn filter_patches(
    patches: Vec<PatchInfo>,
    include_tests: bool,
    include_sources: bool,
) -> Vec<PatchInfo> {
    patches
        .into_iter()
        .filter(|patch| {
            if patch.is_test_file {
                include_tests
            } else {
                include_sources
            }
        })
        .collect()
}
