#![no_main]

use glimpse_core::{Dims, SourceLimit, plan_thumbnail};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: [u32; 6]| {
    let source = Dims::new(data[0], data[1]);
    let max = Dims::new(data[2], data[3]);
    let target = Dims::new(data[4], data[5]);

    if let Ok(planned) = plan_thumbnail(source, max, target, SourceLimit::Enforce) {
        let bounds = target.or_default_thumb();
        if planned != source {
            assert!(planned.width >= 1 && planned.height >= 1);
            assert!(planned.width <= bounds.width && planned.height <= bounds.height);
        }
    }
});
