//! Channel list parsing.

/// Most channels one button can watch.
pub const MAX_CHANNELS: usize = 4;

/// Split a comma-joined channel setting into at most [`MAX_CHANNELS`]
/// trimmed, non-empty entries, keeping their order.
pub fn parse_channel_spec(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .take(MAX_CHANNELS)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trims_and_drops_empty_entries() {
        assert_eq!(
            parse_channel_spec(" xqc ,, trainwreckstv ,"),
            vec!["xqc", "trainwreckstv"]
        );
    }

    #[test]
    fn test_caps_at_four_in_order() {
        assert_eq!(
            parse_channel_spec("a,b,c,d,e,f"),
            vec!["a", "b", "c", "d"]
        );
    }

    #[test]
    fn test_empty_inputs() {
        assert!(parse_channel_spec("").is_empty());
        assert!(parse_channel_spec(" , ,").is_empty());
    }

    #[test]
    fn test_properties_hold_for_assorted_inputs() {
        let inputs = [
            "x",
            ",,,",
            "  a  ,b,,c,d,e  ",
            "one, two,three ,four,five,six,seven",
            "\tspaced\t,\nnewline\n",
        ];
        for input in inputs {
            let parsed = parse_channel_spec(input);
            assert!(parsed.len() <= MAX_CHANNELS, "{input:?}");
            for entry in &parsed {
                assert!(!entry.is_empty());
                assert_eq!(entry.trim(), entry);
            }
            let expected: Vec<_> = input
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .take(MAX_CHANNELS)
                .collect();
            assert_eq!(parsed, expected);
        }
    }
}
