//! Built-in number rewrites.
//!
//! `lower..upper[,step]` words become a generated `$mycroft/number` slot and
//! bare integers become an alternative between the digits and their spoken
//! form. Both convert back to an integer with the `int` converter.

use std::sync::OnceLock;

use regex::Regex;
use template_grammar::{Expression, Sequence, SlotReference, Word};

use crate::replacements::GeneratorResult;

/// Slot that generates number ranges.
pub const NUMBER_SLOT: &str = "mycroft/number";

// The pattern is a literal; `patterns_compile` covers it.
#[allow(clippy::expect_used)]
fn number_range_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(-?[0-9]+)\.\.(-?[0-9]+)(?:,([0-9]+))?$")
            .expect("number range regex is valid; this is a bug")
    })
}

#[allow(clippy::expect_used)]
fn number_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?[0-9]+$").expect("number regex is valid; this is a bug"))
}

/// Turns a numeral into spoken words.
pub trait NumberSpeller: Send + Sync {
    fn spell(&self, n: i64) -> Vec<String>;
}

/// English cardinals: "seventy two", "one hundred and five", "minus three".
#[derive(Debug, Clone, Copy, Default)]
pub struct EnglishNumbers;

const ONES: [&str; 20] = [
    "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
    "eleven", "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen", "eighteen",
    "nineteen",
];
const TENS: [&str; 10] = [
    "", "", "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
];
const SCALES: [&str; 7] = [
    "", "thousand", "million", "billion", "trillion", "quadrillion", "quintillion",
];

impl EnglishNumbers {
    fn below_hundred(n: u64, out: &mut Vec<String>) {
        if n < 20 {
            out.push(ONES[n as usize].to_string());
        } else {
            out.push(TENS[(n / 10) as usize].to_string());
            if n % 10 > 0 {
                out.push(ONES[(n % 10) as usize].to_string());
            }
        }
    }

    fn below_thousand(n: u64, out: &mut Vec<String>) {
        if n >= 100 {
            out.push(ONES[(n / 100) as usize].to_string());
            out.push("hundred".to_string());
            if n % 100 > 0 {
                out.push("and".to_string());
                Self::below_hundred(n % 100, out);
            }
        } else {
            Self::below_hundred(n, out);
        }
    }
}

impl NumberSpeller for EnglishNumbers {
    fn spell(&self, n: i64) -> Vec<String> {
        let mut out = Vec::new();
        if n < 0 {
            out.push("minus".to_string());
        }
        let mut rest = n.unsigned_abs();
        if rest == 0 {
            out.push(ONES[0].to_string());
            return out;
        }

        let mut chunks = Vec::new();
        while rest > 0 {
            chunks.push(rest % 1000);
            rest /= 1000;
        }
        for (scale, chunk) in chunks.iter().enumerate().rev() {
            if *chunk == 0 {
                continue;
            }
            Self::below_thousand(*chunk, &mut out);
            if scale > 0 {
                out.push(SCALES[scale].to_string());
            }
        }
        out
    }
}

/// Values for `$mycroft/number,lower,upper[,step]`, upper bound included.
pub fn number_range_values(args: &[&str]) -> GeneratorResult {
    let nums = args
        .iter()
        .map(|a| a.trim().parse::<i64>())
        .collect::<core::result::Result<Vec<_>, _>>()?;
    let (lower, upper, step) = match nums.as_slice() {
        [lower, upper] => (*lower, *upper, 1),
        [lower, upper, step] => (*lower, *upper, *step),
        _ => return Err(format!("invalid number range arguments: {args:?}").into()),
    };
    if step <= 0 {
        return Err(format!("number range step must be positive, got {step}").into());
    }
    let mut values = Vec::new();
    let mut n = lower;
    while n <= upper {
        values.push(n.to_string());
        n = match n.checked_add(step) {
            Some(next) => next,
            None => break,
        };
    }
    Ok(values)
}

/// Rewrites one bare `lower..upper[,step]` word into a number slot.
fn range_word(word: Word) -> Expression {
    if !word.is_bare() {
        return word.into();
    }
    let Some(caps) = number_range_pattern().captures(&word.text) else {
        return word.into();
    };
    let parsed = (
        caps[1].parse::<i64>(),
        caps[2].parse::<i64>(),
        caps.get(3).map_or(Ok(1), |m| m.as_str().parse::<i64>()),
    );
    let (Ok(lower), Ok(upper), Ok(step)) = parsed else {
        return word.into();
    };
    let mut slot = SlotReference::new(
        word.text.clone(),
        format!("{NUMBER_SLOT},{lower},{upper},{step}"),
    );
    slot.converters = vec!["int".to_string()];
    slot.tag = word.tag;
    slot.into()
}

pub fn rewrite_number_ranges(expr: Expression) -> Expression {
    match expr.map_words(&mut |w| Ok::<_, std::convert::Infallible>(range_word(w))) {
        Ok(e) => e,
        Err(never) => match never {},
    }
}

/// Rewrites one bare integer word into `(n | spoken words):n!int`.
fn integer_word(word: Word, speller: &dyn NumberSpeller) -> Expression {
    if !word.is_bare() || !number_pattern().is_match(&word.text) {
        return word.into();
    }
    let Ok(n) = word.text.parse::<i64>() else {
        return word.into();
    };

    let spoken = speller.spell(n);
    let mut items: Vec<Expression> = vec![Word::new(word.text.clone()).into()];
    match spoken.as_slice() {
        [] => {}
        [single] if *single == word.text => {}
        [single] => items.push(Word::new(single.clone()).into()),
        many => items.push(
            Sequence::group(
                many.join(" "),
                many.iter().map(|w| Word::new(w.clone()).into()).collect(),
            )
            .into(),
        ),
    }

    let mut alt = Sequence::alternative(word.text.clone(), items);
    alt.substitution = Some(vec![n.to_string()]);
    alt.converters = vec!["int".to_string()];
    alt.tag = word.tag;
    alt.into()
}

pub fn rewrite_numbers(expr: Expression, speller: &dyn NumberSpeller) -> Expression {
    match expr.map_words(&mut |w| Ok::<_, std::convert::Infallible>(integer_word(w, speller))) {
        Ok(e) => e,
        Err(never) => match never {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use template_grammar::{parse_sentence, SequenceKind};

    fn spell(n: i64) -> String {
        EnglishNumbers.spell(n).join(" ")
    }

    #[test]
    fn patterns_compile() {
        let caps = number_range_pattern().captures("-5..10,5").unwrap();
        assert_eq!((&caps[1], &caps[2], &caps[3]), ("-5", "10", "5"));
        assert!(number_pattern().is_match("-12"));
        assert!(!number_pattern().is_match("12a"));
    }

    #[test]
    fn english_cardinals() {
        assert_eq!(spell(0), "zero");
        assert_eq!(spell(7), "seven");
        assert_eq!(spell(19), "nineteen");
        assert_eq!(spell(72), "seventy two");
        assert_eq!(spell(100), "one hundred");
        assert_eq!(spell(105), "one hundred and five");
        assert_eq!(spell(2001), "two thousand one");
        assert_eq!(spell(1_250_000), "one million two hundred and fifty thousand");
        assert_eq!(spell(-5), "minus five");
        assert!(!EnglishNumbers.spell(i64::MIN).is_empty());
    }

    #[test]
    fn range_values() {
        assert_eq!(number_range_values(&["1", "3"]).unwrap(), vec!["1", "2", "3"]);
        assert_eq!(number_range_values(&["0", "10", "5"]).unwrap(), vec!["0", "5", "10"]);
        assert_eq!(number_range_values(&["-1", "1"]).unwrap(), vec!["-1", "0", "1"]);
        assert!(number_range_values(&["1"]).is_err());
        assert!(number_range_values(&["1", "x"]).is_err());
        assert!(number_range_values(&["1", "5", "0"]).is_err());
    }

    #[test]
    fn ranges_become_slots_and_keep_tags() {
        let s = parse_sentence("set to 0..100,5{level} please", None).unwrap();
        let Expression::Sequence(out) = rewrite_number_ranges(s.into()) else {
            panic!("expected sequence");
        };
        let Expression::Slot(slot) = &out.items[2] else {
            panic!("expected slot");
        };
        assert_eq!(slot.slot_name, "mycroft/number,0,100,5");
        assert_eq!(slot.converters, vec!["int".to_string()]);
        assert_eq!(slot.tag.as_ref().map(|t| t.name.as_str()), Some("level"));
        assert_eq!(out.items[3].text(), "please");
    }

    #[test]
    fn integers_become_alternatives() {
        let s = parse_sentence("wait 75 seconds", None).unwrap();
        let Expression::Sequence(out) = rewrite_numbers(s.into(), &EnglishNumbers) else {
            panic!("expected sequence");
        };
        let Expression::Sequence(alt) = &out.items[1] else {
            panic!("expected alternative");
        };
        assert_eq!(alt.kind, SequenceKind::Alternative);
        assert_eq!(alt.substitution, Some(vec!["75".to_string()]));
        assert_eq!(alt.converters, vec!["int".to_string()]);
        assert_eq!(alt.items[0].text(), "75");
        assert_eq!(alt.items[1].text(), "seventy five");
    }

    #[test]
    fn words_with_suffixes_are_left_alone() {
        let s = parse_sentence("5:five 1..3!float", None).unwrap();
        let before = s.clone();
        let out = rewrite_number_ranges(rewrite_numbers(s.into(), &EnglishNumbers));
        assert_eq!(out, Expression::Sequence(before));
    }
}
