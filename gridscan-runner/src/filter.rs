//! Pre-fetch exclusion filter.

use crate::config::ExclusionRules;
use gridscan_core::domain::Instrument;

/// Why an instrument was excluded before any fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exclusion {
    NameKeyword(String),
    CodePrefix(String),
}

impl std::fmt::Display for Exclusion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Exclusion::NameKeyword(k) => write!(f, "name contains '{k}'"),
            Exclusion::CodePrefix(p) => write!(f, "code starts with '{p}'"),
        }
    }
}

impl ExclusionRules {
    /// First matching rule, or `None` if the instrument may be fetched.
    pub fn check(&self, instrument: &Instrument) -> Option<Exclusion> {
        if let Some(k) = self
            .name_keywords
            .iter()
            .find(|k| !k.is_empty() && instrument.name.contains(k.as_str()))
        {
            return Some(Exclusion::NameKeyword(k.clone()));
        }
        self.code_prefixes
            .iter()
            .find(|p| !p.is_empty() && instrument.code.starts_with(p.as_str()))
            .map(|p| Exclusion::CodePrefix(p.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanProfile;

    #[test]
    fn fund_keywords() {
        let rules = ScanProfile::etf().exclusions;
        assert_eq!(
            rules.check(&Instrument::new("511880", "银华日利货币ETF")),
            Some(Exclusion::NameKeyword("货币".into()))
        );
        assert!(rules.check(&Instrument::new("511010", "国债ETF")).is_some());
        assert!(rules.check(&Instrument::new("518880", "黄金ETF")).is_some());
        assert_eq!(rules.check(&Instrument::new("510300", "沪深300ETF")), None);
    }

    #[test]
    fn equity_names_and_prefixes() {
        let rules = ScanProfile::equity().exclusions;
        assert!(rules.check(&Instrument::new("600001", "*ST样本")).is_some());
        assert!(rules.check(&Instrument::new("600002", "退市样本")).is_some());
        assert_eq!(
            rules.check(&Instrument::new("830799", "艾融软件")),
            Some(Exclusion::CodePrefix("8".into()))
        );
        assert!(rules.check(&Instrument::new("430047", "诺思兰德")).is_some());
        assert_eq!(rules.check(&Instrument::new("600519", "贵州茅台")), None);
    }

    #[test]
    fn empty_rules_never_match() {
        let rules = ExclusionRules {
            name_keywords: vec![String::new()],
            code_prefixes: vec![String::new()],
        };
        assert_eq!(rules.check(&Instrument::new("600519", "贵州茅台")), None);
    }
}
