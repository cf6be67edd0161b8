#![no_main]
use exi_grammar::{ExiOptions, GrammarCache};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(xml) = std::str::from_utf8(data) {
        let opts = ExiOptions::default();
        let Ok(cache) = GrammarCache::schema_less(opts.clone()) else {
            return;
        };
        if let Ok(events) = exi_grammar::parse_xml_events_from_str(xml, &opts) {
            if let Ok(items) = exi_grammar::encode(&cache, &events) {
                let decoded = exi_grammar::decode(&cache, &items).expect("encoded stream must decode");
                assert_eq!(decoded.len(), items.len());
            }
        }
    }
});
