//! Parses the output of `forge create`.
//!
//! With `--json` forge prints a single object like
//! `{"deployer":"0x…","deployedTo":"0x…","transactionHash":"0x…"}`, otherwise
//! a human readable report containing a `Deployed to: 0x…` line. Both are
//! accepted.

use {
    alloy::primitives::Address,
    regex::Regex,
    serde::Deserialize,
    std::sync::LazyLock,
};

static DEPLOYED_TO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Deployed to: (\S+)").expect("valid regex"));

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("output does not mention a deployed address")]
    NotFound,
    #[error("malformed address {0:?}")]
    Malformed(String),
    #[error("contract deployed to the zero address")]
    ZeroAddress,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonOutput {
    deployed_to: String,
}

pub fn deployed_address(output: &str) -> Result<Address, ParseError> {
    let raw = output
        .lines()
        .find_map(|line| serde_json::from_str::<JsonOutput>(line.trim()).ok())
        .map(|json| json.deployed_to)
        .or_else(|| {
            DEPLOYED_TO
                .captures(output)
                .map(|captures| captures[1].to_string())
        })
        .ok_or(ParseError::NotFound)?;

    let address: Address = raw.parse().map_err(|_| ParseError::Malformed(raw.clone()))?;
    if address.is_zero() {
        return Err(ParseError::ZeroAddress);
    }
    Ok(address)
}

#[cfg(test)]
mod tests {
    use {super::*, alloy::primitives::address};

    #[test]
    fn parses_human_readable_report() {
        let output = "\
[⠊] Compiling...
No files changed, compilation skipped
Deployer: 0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266
Deployed to: 0x5FbDB2315678afecb367f032d93F642f64180aa3
Transaction hash: 0x4dd3b5a4ed8e1bb3ba4a2c3bba8e83c3cb0d4e0d8d8a5e0d2bd7e0fcbcdf6c6e
";
        assert_eq!(
            deployed_address(output),
            Ok(address!("0x5FbDB2315678afecb367f032d93F642f64180aa3"))
        );
    }

    #[test]
    fn parses_json_report() {
        let output = r#"No files changed, compilation skipped
{"deployer":"0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266","deployedTo":"0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512","transactionHash":"0x01"}"#;
        assert_eq!(
            deployed_address(output),
            Ok(address!("0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512"))
        );
    }

    #[test]
    fn reports_missing_and_malformed_addresses() {
        assert_eq!(
            deployed_address("Error: transaction reverted"),
            Err(ParseError::NotFound)
        );
        assert_eq!(
            deployed_address("Deployed to: 0x1234"),
            Err(ParseError::Malformed("0x1234".into()))
        );
        assert_eq!(
            deployed_address("Deployed to: 0x0000000000000000000000000000000000000000"),
            Err(ParseError::ZeroAddress)
        );
    }
}
