use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

const FIXTURE: &str = "tests/fixtures/ledger.json";
const BUYER: &str = "0x0000000000000000000000000000000000000007";
const USDC: &str = "0x0000000000000000000000000000000000000001";

fn vend() -> Command {
    let mut cmd = Command::new(cargo_bin!("mutual-vend"));
    cmd.env("RUST_LOG", "warn");
    cmd
}

#[test]
fn test_cli_lists_tracks() -> Result<(), Box<dyn std::error::Error>> {
    vend()
        .arg(FIXTURE)
        .arg("tracks")
        .assert()
        .success()
        .stdout(predicate::str::contains("id,name,price,stock,active"))
        .stdout(predicate::str::contains("1,Water,500,0,true"))
        .stdout(predicate::str::contains("3,Cola,1000,5,true"));

    Ok(())
}

#[test]
fn test_cli_lists_accepted_tokens() {
    vend()
        .arg(FIXTURE)
        .args(["--account", BUYER, "tokens"])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("{USDC},USDC,2,25.00")))
        .stdout(predicate::str::contains("OLD").not());
}

#[test]
fn test_cli_purchase_with_approval() {
    vend()
        .arg(FIXTURE)
        .args(["--account", BUYER, "--poll-interval-ms", "10"])
        .args(["purchase", "--track", "3", "--token", USDC])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "status,track,token,operation,confirmed,reward,error",
        ))
        .stdout(predicate::str::contains(format!("success,3,{USDC},0x")))
        .stdout(predicate::str::contains(",confirmed,true,"));
}

#[test]
fn test_cli_purchase_out_of_stock_fails() {
    vend()
        .arg(FIXTURE)
        .args(["--account", BUYER, "--poll-interval-ms", "10"])
        .args(["purchase", "--track", "1", "--token", USDC])
        .assert()
        .failure()
        .stdout(predicate::str::contains(format!("error,1,{USDC},")))
        .stdout(predicate::str::contains("insufficient-stock"));
}

#[test]
fn test_cli_purchase_requires_account() {
    vend()
        .arg(FIXTURE)
        .args(["purchase", "--track", "3", "--token", USDC])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--account is required"));
}

#[test]
fn test_cli_rejects_malformed_address() {
    vend()
        .arg(FIXTURE)
        .args(["--account", "0x1234", "tokens"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid address"));
}

#[test]
fn test_cli_times_out_unconfirmed_approval() {
    let mut fixture = NamedTempFile::new().unwrap();
    write!(
        fixture,
        r#"{{
            "vending_contract": "0x00000000000000000000000000000000000000fe",
            "tokens": [{{
                "address": "{USDC}",
                "symbol": "USDC",
                "decimals": 2,
                "balances": {{ "{BUYER}": 1000 }}
            }}],
            "tracks": [{{ "id": 3, "name": "Cola", "price": 1000, "stock": 5 }}],
            "receipt_delay_polls": 4294967295
        }}"#
    )
    .unwrap();

    vend()
        .arg(fixture.path())
        .args(["--account", BUYER, "--poll-interval-ms", "1", "--max-attempts", "3"])
        .args(["purchase", "--track", "3", "--token", USDC])
        .assert()
        .failure()
        .stdout(predicate::str::contains("receipt-timeout"));
}

#[test]
fn test_cli_unconfirmed_vend_fails() {
    let mut fixture = NamedTempFile::new().unwrap();
    write!(
        fixture,
        r#"{{
            "vending_contract": "0x00000000000000000000000000000000000000fe",
            "tokens": [{{
                "address": "{USDC}",
                "symbol": "USDC",
                "decimals": 2,
                "balances": {{ "{BUYER}": 1000 }},
                "allowances": [{{ "owner": "{BUYER}", "amount": 1000 }}]
            }}],
            "tracks": [{{ "id": 3, "name": "Cola", "price": 1000, "stock": 5 }}],
            "receipt_delay_polls": 4294967295
        }}"#
    )
    .unwrap();

    vend()
        .arg(fixture.path())
        .args(["--account", BUYER, "--poll-interval-ms", "1", "--max-attempts", "3"])
        .args(["purchase", "--track", "3", "--token", USDC])
        .assert()
        .failure()
        .stdout(predicate::str::contains(format!("success,3,{USDC},0x")))
        .stdout(predicate::str::contains(",failed,,"))
        .stderr(predicate::str::contains("was not confirmed after 3 polls"));
}
