#![no_main]

use libfuzzer_sys::fuzz_target;

/// Keep the harness itself bounded: formulas come from single spreadsheet
/// cells, so very large inputs only slow the fuzzer down.
const MAX_FUZZ_FORMULA_CHARS: usize = 4_096;
const MAX_INPUT_BYTES: usize = MAX_FUZZ_FORMULA_CHARS * 4; // max UTF-8 bytes per char

fn truncate_to_chars(s: &str, max_chars: usize) -> &str {
    let mut count = 0usize;
    for (idx, _) in s.char_indices() {
        if count == max_chars {
            return &s[..idx];
        }
        count += 1;
    }
    s
}

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let data = if data.len() > MAX_INPUT_BYTES {
        &data[..MAX_INPUT_BYTES]
    } else {
        data
    };

    // Accept arbitrary bytes as input; treat invalid UTF-8 lossy.
    let input = String::from_utf8_lossy(data);
    let formula = truncate_to_chars(&input, MAX_FUZZ_FORMULA_CHARS);

    // Parsing must never panic; a successful parse must also survive the
    // availability walk and evaluation against an empty cache.
    if let Ok(ast) = glossa_engine::parse_formula(formula) {
        let ctx = glossa_engine::functions::testing::NullContext::default();
        let _ = ast.immediate_available();
        if ast.available(&ctx) {
            let _ = ast.evaluate(&ctx);
        }
    }

    // The splitter alone must also be total over arbitrary input.
    let _ = glossa_engine::parser::split_sections(formula, 0);
});
