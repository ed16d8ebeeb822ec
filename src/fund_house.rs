//! Fund house (AMC) reference data and attribution by scheme-name prefix

/// Catch-all bucket for scheme names with no known prefix.
pub const OTHER: &str = "Other";

/// Upstream fund-house ids and registered names.
pub const ALL_AMCS: &[(u32, &str)] = &[
    (1, "360 ONE MF"),
    (2, "Aditya Birla Sun Life MF"),
    (3, "Angel One MF"),
    (4, "Axis MF"),
    (5, "Bajaj Finserv MF"),
    (6, "Bandhan MF"),
    (7, "Bank of India MF"),
    (8, "Baroda BNP Paribas MF"),
    (9, "Canara Robeco MF"),
    (10, "DSP MF"),
    (11, "Edelweiss MF"),
    (12, "Franklin Templeton MF"),
    (13, "Groww MF"),
    (14, "HDFC MF"),
    (15, "Helios MF"),
    (16, "HSBC MF"),
    (17, "ICICI Prudential MF"),
    (20, "Invesco MF"),
    (21, "ITI MF"),
    (22, "JM Financial MF"),
    (23, "Kotak Mahindra MF"),
    (24, "LIC MF"),
    (25, "Mahindra Manulife MF"),
    (26, "Mirae Asset MF"),
    (27, "Motilal Oswal MF"),
    (28, "Navi MF"),
    (29, "Nippon India MF"),
    (30, "NJ MF"),
    (31, "Old Bridge MF"),
    (32, "PGIM India MF"),
    (33, "PPFAS MF"),
    (34, "Quant MF"),
    (35, "Quantum MF"),
    (36, "SBI MF"),
    (37, "Samco MF"),
    (38, "Shriram MF"),
    (39, "Sundaram MF"),
    (40, "Tata MF"),
    (41, "Taurus MF"),
    (42, "Trust MF"),
    (43, "Union MF"),
    (44, "UTI MF"),
    (45, "WhiteOak Capital MF"),
    (46, "Zerodha MF"),
];

const SHORT_NAMES: &[(&str, &str)] = &[
    ("360 ONE MF", "360 ONE"),
    ("Aditya Birla Sun Life MF", "ABSL"),
    ("Axis MF", "Axis"),
    ("Bajaj Finserv MF", "Bajaj Finserv"),
    ("Bandhan MF", "Bandhan"),
    ("Baroda BNP Paribas MF", "Baroda BNP"),
    ("Canara Robeco MF", "Canara Robeco"),
    ("DSP MF", "DSP"),
    ("Edelweiss MF", "Edelweiss"),
    ("Franklin Templeton MF", "Franklin"),
    ("HDFC MF", "HDFC"),
    ("HSBC MF", "HSBC"),
    ("ICICI Prudential MF", "ICICI Pru"),
    ("Invesco MF", "Invesco"),
    ("Kotak Mahindra MF", "Kotak"),
    ("LIC MF", "LIC"),
    ("Mirae Asset MF", "Mirae"),
    ("Motilal Oswal MF", "Motilal Oswal"),
    ("Nippon India MF", "Nippon"),
    ("PPFAS MF", "PPFAS"),
    ("Quant MF", "Quant"),
    ("SBI MF", "SBI"),
    ("Sundaram MF", "Sundaram"),
    ("Tata MF", "Tata"),
    ("UTI MF", "UTI"),
    ("WhiteOak Capital MF", "WhiteOak"),
];

/// Scheme-name prefixes and the short fund-house name they map to.
const PREFIXES: &[(&str, &str)] = &[
    ("360 ONE ", "360 ONE"),
    ("Aditya Birla Sun Life ", "ABSL"),
    ("Angel One ", "Angel One"),
    ("Axis ", "Axis"),
    ("Bajaj Finserv ", "Bajaj Finserv"),
    ("Bandhan ", "Bandhan"),
    ("Bank of India ", "Bank of India"),
    ("Baroda BNP Paribas ", "Baroda BNP"),
    ("Canara Robeco ", "Canara Robeco"),
    ("Capitalmind ", "Capitalmind"),
    ("Choice ", "Choice"),
    ("DSP ", "DSP"),
    ("Edelweiss ", "Edelweiss"),
    ("Franklin India ", "Franklin"),
    ("Groww ", "Groww"),
    ("HDFC ", "HDFC"),
    ("HSBC ", "HSBC"),
    ("Helios ", "Helios"),
    ("ICICI Prudential ", "ICICI Pru"),
    ("ITI ", "ITI"),
    ("Invesco India ", "Invesco"),
    ("JM ", "JM Financial"),
    ("Jio BlackRock ", "Jio BlackRock"),
    ("Kotak ", "Kotak"),
    ("LIC MF ", "LIC"),
    ("Mahindra Manulife ", "Mahindra Manulife"),
    ("Mirae Asset ", "Mirae"),
    ("Motilal Oswal ", "Motilal Oswal"),
    ("NJ ", "NJ"),
    ("Navi ", "Navi"),
    ("Nippon India ", "Nippon"),
    ("Old Bridge ", "Old Bridge"),
    ("PGIM India ", "PGIM"),
    ("Parag Parikh ", "PPFAS"),
    ("Quant ", "Quant"),
    ("Quantum ", "Quantum"),
    ("SBI ", "SBI"),
    ("Samco ", "Samco"),
    ("Shriram ", "Shriram"),
    ("Sundaram ", "Sundaram"),
    ("Tata ", "Tata"),
    ("Taurus ", "Taurus"),
    ("Trust ", "Trust"),
    ("Union ", "Union"),
    ("UTI ", "UTI"),
    ("WhiteOak Capital ", "WhiteOak"),
    ("Zerodha ", "Zerodha"),
];

/// Short fund-house name for a scheme, by longest matching name prefix.
pub fn attribute(scheme_name: &str) -> &'static str {
    longest_prefix(PREFIXES, scheme_name).unwrap_or(OTHER)
}

fn longest_prefix(table: &[(&str, &'static str)], name: &str) -> Option<&'static str> {
    table
        .iter()
        .filter(|(prefix, _)| name.starts_with(prefix))
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|(_, short)| *short)
}

/// Registered name for an upstream fund-house id.
pub fn amc_name(id: u32) -> Option<&'static str> {
    ALL_AMCS
        .iter()
        .find(|(amc_id, _)| *amc_id == id)
        .map(|(_, name)| *name)
}

/// Display name: the curated short name, else the registered name minus
/// its " Mutual Fund" / " MF" suffix.
pub fn short_name(amc_name: &str) -> String {
    SHORT_NAMES
        .iter()
        .find(|(name, _)| *name == amc_name)
        .map(|(_, short)| short.to_string())
        .unwrap_or_else(|| amc_name.replace(" Mutual Fund", "").replace(" MF", ""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_known_prefixes() {
        assert_eq!(attribute("ICICI Prudential Bluechip Fund"), "ICICI Pru");
        assert_eq!(attribute("Parag Parikh Flexi Cap Fund"), "PPFAS");
        assert_eq!(attribute("HDFC Balanced Advantage Fund"), "HDFC");
    }

    #[test]
    fn test_attribute_prefers_longest_prefix() {
        let table = [("Franklin ", "Franklin"), ("Franklin India ", "Franklin India")];
        assert_eq!(longest_prefix(&table, "Franklin India Bluechip Fund"), Some("Franklin India"));
        assert_eq!(longest_prefix(&table, "Franklin Build India Fund"), Some("Franklin"));

        assert_eq!(attribute("Quantum Long Term Equity Value Fund"), "Quantum");
        assert_eq!(attribute("Quant Small Cap Fund"), "Quant");
    }

    #[test]
    fn test_attribute_unknown_is_other() {
        assert_eq!(attribute("Brand New AMC Flexi Cap Fund"), OTHER);
        assert_eq!(attribute(""), OTHER);
        // prefixes are case- and space-sensitive
        assert_eq!(attribute("HDFCTop 100"), OTHER);
    }

    #[test]
    fn test_amc_lookup_and_short_names() {
        assert_eq!(amc_name(17), Some("ICICI Prudential MF"));
        assert_eq!(amc_name(18), None);
        assert_eq!(short_name("ICICI Prudential MF"), "ICICI Pru");
        assert_eq!(short_name("Groww MF"), "Groww");
        assert_eq!(short_name("Example Mutual Fund"), "Example");
    }
}
