#![no_main]

use libfuzzer_sys::fuzz_target;
use serde_json::json;

fuzz_target!(|data: &[u8]| {
    // Any input either parses or is rejected; it must never panic
    let Ok(script) = nxsfileinfo::copymap::parse_edit_script(data) else {
        return;
    };

    // Applying a parsed script to a record must not panic either
    let mut record = json!({
        "scientificMetadata": {
            "instrument": {"name": {"value": "P09"}},
            "sample": {"name": {"value": "water"}}
        },
        "pid": "16171271/scan_1"
    })
    .as_object()
    .cloned()
    .unwrap_or_default();
    script.apply(&mut record);
});
