//! Regex tables that pull deal details out of article text.
//!
//! Each field has an ordered list of patterns; the first pattern that yields a
//! usable capture wins. [`base`] covers the common phrasings; [`extended`]
//! adds the completed-deal and passive-voice forms used by sites with longer
//! write-ups.

use crate::models::{DealMultiple, DealValue, ExtractionRecord, Informed, Magnitude};
use once_cell::sync::Lazy;
use regex::Regex;

const PARTY_END: &str = r"(?:[,.;:()\n]|\s+(?:por|em|no|na|pelo|pela|que|para|após|com)\b|$)";

const BASE_BUYER: &[&str] = &[
    r"\b(?:A|a|O|o) ([\w ]+?) (?:adquiriu|comprou|anunciou a compra)",
    r"([\w ]+?) (?:fechou acordo|assinou contrato) para (?:adquirir|comprar)",
    r"([\w ]+?) (?:anunciou|comunicou|informou) (?:a aquisição|a compra)",
];

const EXTRA_BUYER: &[&str] = &[
    r"([\w ]+?) (?:concluiu|finalizou) (?:a aquisição|a compra)",
    r"([\w ]+?) (?:é a compradora|é a adquirente)",
];

const CURRENCY: &str = r"(?:R\$|USD|US\$|€|EUR)";
const AMOUNT: &str = r"([\d.,]+)\s*(milhões|bilhões|milhão|bilhão)";

const EXTRA_ACQUIRED: &[&str] = &[
    r"([\w ]+?) (?:foi adquirida|foi comprada)",
    r"([\w ]+?) (?:é a empresa adquirida|é o alvo da aquisição)",
];

const BASE_MULTIPLE: &[&str] = &[
    r"([\d.,]+)\s*(?:x|vezes)\s*(?:o |a |)(EBITDA|receita|faturamento)",
    r"múltiplo de ([\d.,]+)\s*(?:x|vezes)\s*(?:o |a |)(EBITDA|receita|faturamento)",
    r"([\d.,]+)\s*(?:x|vezes) (?:o valor|a cifra)",
];

const EXTRA_MULTIPLE: &[&str] = &[r"equivale a ([\d.,]+)\s*(?:x|vezes)"];

static CURRENCY_SYMBOL: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(R\$|USD|US\$|€|EUR)").ok());

fn acquired_patterns() -> Vec<String> {
    [
        r"(?:adquiriu|comprou|anunciou a compra de) (?:a empresa |a |o |)([\w ]+?)",
        r"(?:aquisição|compra) d[ao] ([\w ]+?)",
        r"(?:adquirir|comprar) (?:a empresa |a |o |)([\w ]+?)",
    ]
    .iter()
    .map(|p| format!("{p}{PARTY_END}"))
    .collect()
}

fn value_patterns(extended: bool) -> Vec<String> {
    let mut prefixes = vec![r"(?:valor|montante|preço) de ", "", "transação de "];
    if extended {
        prefixes.extend(["avaliada em ", "estimado em "]);
    }
    prefixes
        .into_iter()
        .map(|prefix| format!("{prefix}{CURRENCY} {AMOUNT}"))
        .collect()
}

fn compile<S: AsRef<str>>(patterns: &[S]) -> Vec<Regex> {
    patterns.iter().filter_map(|p| Regex::new(p.as_ref()).ok()).collect()
}

/// Ordered pattern lists per record field.
#[derive(Debug)]
pub struct TransactionRules {
    buyer: Vec<Regex>,
    acquired: Vec<Regex>,
    value: Vec<Regex>,
    multiple: Vec<Regex>,
}

static BASE: Lazy<TransactionRules> = Lazy::new(|| TransactionRules {
    buyer: compile(BASE_BUYER),
    acquired: compile(&acquired_patterns()),
    value: compile(&value_patterns(false)),
    multiple: compile(BASE_MULTIPLE),
});

static EXTENDED: Lazy<TransactionRules> = Lazy::new(|| {
    let acquired_extra: Vec<String> = EXTRA_ACQUIRED.iter().map(|p| p.to_string()).collect();
    TransactionRules {
        buyer: compile(&[BASE_BUYER, EXTRA_BUYER].concat()),
        acquired: compile(&[acquired_patterns(), acquired_extra].concat()),
        value: compile(&value_patterns(true)),
        multiple: compile(&[BASE_MULTIPLE, EXTRA_MULTIPLE].concat()),
    }
});

pub fn base() -> &'static TransactionRules {
    &BASE
}

pub fn extended() -> &'static TransactionRules {
    &EXTENDED
}

/// Trim, drop a leading article, collapse whitespace.
fn clean_party(raw: &str) -> Option<String> {
    let words: Vec<&str> = raw.split_whitespace().collect();
    let words = match words.split_first() {
        Some((first, rest)) if !rest.is_empty() && matches!(*first, "a" | "o" | "A" | "O") => rest,
        _ => &words[..],
    };
    let party = words.join(" ");
    (!party.is_empty()).then_some(party)
}

/// Parse a Brazilian-formatted number: `1.234,5` -> `1234.5`.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned = raw.trim_end_matches(['.', ',']).replace('.', "").replace(',', ".");
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_ratio(raw: &str) -> Option<f64> {
    raw.trim_end_matches(['.', ','])
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

impl TransactionRules {
    pub fn buyer(&self, text: &str) -> Option<String> {
        self.buyer
            .iter()
            .filter_map(|re| re.captures(text))
            .find_map(|caps| clean_party(caps.get(1)?.as_str()))
    }

    pub fn acquired(&self, text: &str) -> Option<String> {
        self.acquired
            .iter()
            .filter_map(|re| re.captures(text))
            .find_map(|caps| clean_party(caps.get(1)?.as_str()))
    }

    /// Deal value; the currency is the first currency symbol in `text`.
    pub fn value(&self, text: &str) -> Option<DealValue> {
        let (amount, magnitude) = self.value.iter().filter_map(|re| re.captures(text)).find_map(|caps| {
            let amount = parse_amount(caps.get(1)?.as_str())?;
            let magnitude = Magnitude::from_word(caps.get(2)?.as_str())?;
            Some((amount, magnitude))
        })?;

        let currency = CURRENCY_SYMBOL
            .as_ref()
            .and_then(|re| re.find(text))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| "R$".to_string());

        Some(DealValue {
            currency,
            amount,
            magnitude,
        })
    }

    pub fn multiple(&self, text: &str) -> Option<DealMultiple> {
        self.multiple.iter().filter_map(|re| re.captures(text)).find_map(|caps| {
            Some(DealMultiple {
                ratio: parse_ratio(caps.get(1)?.as_str())?,
                basis: caps.get(2).map(|m| m.as_str().to_string()),
            })
        })
    }

    /// Fill the deal fields of `record` from `text`. Fields with no match
    /// are left unset.
    pub fn apply(&self, record: &mut ExtractionRecord, text: &str) {
        record.buyer = Informed::from(self.buyer(text));
        record.acquired = Informed::from(self.acquired(text));
        record.value = Informed::from(self.value(text));
        record.multiple = Informed::from(self.multiple(text));
    }
}
