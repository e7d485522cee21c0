#![no_main]

use libfuzzer_sys::fuzz_target;
use pescope::{LoadConfig, Module};

fuzz_target!(|data: &[u8]| {
    if let Ok(module) = Module::from_mem_with_config(data.to_vec(), LoadConfig::strict()) {
        let _ = module.is_degraded();
        if let Some(exports) = module.exports() {
            for record in &exports.records {
                let _ = exports.address_of(&record.name);
            }
        }
        if let Some(relocations) = module.relocations() {
            let _ = relocations.targets().count();
        }
    }
});
