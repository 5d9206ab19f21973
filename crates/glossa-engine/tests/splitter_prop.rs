//! Property coverage for the splitter and the left-to-right fold.

use glossa_engine::functions::testing::NullContext;
use glossa_engine::parser::{parse_formula_body, split_sections};
use glossa_engine::Value;
use proptest::prelude::*;

proptest! {
    #[test]
    fn subtraction_chains_fold_left_to_right(values in prop::collection::vec(0u32..1000, 1..6)) {
        let formula = values
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(" - ");
        let expected = values[1..]
            .iter()
            .fold(f64::from(values[0]), |acc, v| acc - f64::from(*v));

        let ctx = NullContext::default();
        let got = parse_formula_body(&formula).unwrap().evaluate(&ctx);
        prop_assert_eq!(got, Value::Number(expected));
    }

    #[test]
    fn string_literals_round_trip_through_escaping(s in "\\PC*") {
        let escaped = s.replace('\\', "\\\\").replace('"', "\\\"");
        let formula = format!("\"{escaped}\"");

        let ctx = NullContext::default();
        let got = parse_formula_body(&formula).unwrap().evaluate(&ctx);
        prop_assert_eq!(got, Value::Text(s));
    }

    #[test]
    fn top_level_commas_split_one_section_per_atom(kinds in prop::collection::vec(0u8..3, 1..6)) {
        let atoms: Vec<&str> = kinds
            .iter()
            .map(|k| match k {
                0 => "1",
                1 => "{1, 2}",
                _ => r#"run("a,b", 'c,d')"#,
            })
            .collect();
        let input = atoms.join(",");

        let sections = split_sections(&input, 0).unwrap();
        prop_assert_eq!(sections.len(), atoms.len());
        for (section, atom) in sections.iter().zip(&atoms) {
            prop_assert_eq!(section.text, *atom);
        }
    }
}
