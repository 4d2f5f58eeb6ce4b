use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

struct Env {
    dir: TempDir,
}

impl Env {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn path(&self, name: &str) -> std::path::PathBuf {
        self.dir.path().join(name)
    }

    fn write(&self, name: &str, content: &str) -> std::path::PathBuf {
        let path = self.path(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    /// `tally` with an isolated database and config directory.
    fn tally(&self) -> Command {
        let mut cmd = Command::cargo_bin("tally").unwrap();
        cmd.env_remove("RUST_LOG")
            .env_remove("TALLY_DB")
            .env("HOME", self.dir.path())
            .env("XDG_CONFIG_HOME", self.dir.path().join("config"))
            .env("XDG_DATA_HOME", self.dir.path().join("data"))
            .arg("--db")
            .arg(self.path("ledger.db"));
        cmd
    }
}

fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

const MAY_CSV: &str = "2024-05-01,Gym,-30.00,Health\n2024-05-02,Bonus,500.00,Income\n";

#[test]
fn import_then_reimport_counts_duplicates() {
    let env = Env::new();
    let csv = env.write("may.csv", MAY_CSV);

    env.tally()
        .args(["import", arg(&csv)])
        .assert()
        .success()
        .stdout(predicate::str::contains("Importing file:"))
        .stdout(predicate::str::contains(
            "CSV import complete. 2 imported, 0 skipped, 0 duplicates skipped.",
        ));

    env.tally()
        .args(["import", arg(&csv)])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "CSV import complete. 0 imported, 0 skipped, 2 duplicates skipped.",
        ));

    env.tally()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("Health"))
        .stdout(predicate::str::contains("Income"))
        .stdout(predicate::str::contains("Gym").count(1));
}

#[test]
fn unsupported_extension_fails_with_message() {
    let env = Env::new();
    let file = env.write("statement.xls", "whatever");

    env.tally()
        .args(["import", arg(&file)])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains(
            "error: Unsupported file format '.xls'. Please use .csv or .ofx",
        ));
}

#[test]
fn rules_categorize_ofx_import() {
    let env = Env::new();
    env.tally()
        .args(["rules", "add", "--pattern", "netflix", "--category", "streaming"])
        .assert()
        .success();

    let ofx = env.write(
        "stmt.QFX",
        "<OFX><BANKTRANLIST>\
         <STMTTRN><TRNTYPE>DEBIT</TRNTYPE><DTPOSTED>20240510</DTPOSTED><TRNAMT>-15.49</TRNAMT><NAME>NETFLIX.COM</NAME></STMTTRN>\
         <STMTTRN><TRNTYPE>DEBIT</TRNTYPE><DTPOSTED>20240511</DTPOSTED><TRNAMT>-4.00</TRNAMT><NAME>Corner Shop</NAME><MEMO>milk</MEMO></STMTTRN>\
         </BANKTRANLIST></OFX>",
    );
    env.tally()
        .args(["import", arg(&ofx)])
        .assert()
        .success()
        .stdout(predicate::str::contains("OFX import complete. 2 imported"));

    env.tally()
        .args(["search", "netflix"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Streaming"));
    env.tally()
        .args(["search", "corner"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Corner Shop - milk"))
        .stdout(predicate::str::contains("Uncategorized"));
}

#[test]
fn invalid_rule_is_rejected() {
    let env = Env::new();
    env.tally()
        .args(["rules", "add", "--pattern", "([a-z", "--category", "Broken"])
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("error: Invalid rule pattern"));
    env.tally()
        .args(["rules", "list"])
        .assert()
        .success()
        .stdout("No rules defined.\n");
}

#[test]
fn rules_import_from_toml() {
    let env = Env::new();
    let rules = env.write(
        "rules.toml",
        "[[rule]]\npattern = \"^uber\"\ncategory = \"transport\"\n\n[[rule]]\npattern = \"grocer\"\ncategory = \"food\"\n",
    );
    env.tally()
        .args(["rules", "import", arg(&rules)])
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 2 rules"));
    env.tally()
        .args(["rules", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1. [id 1] /^uber/ -> Transport"))
        .stdout(predicate::str::contains("2. [id 2] /grocer/ -> Food"));
}

#[test]
fn budget_alerts_on_add_and_list_status() {
    let env = Env::new();
    env.tally()
        .args(["budget", "add", "--category", "food", "--amount", "100"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Budget set: Food 100.00 per monthly"));

    env.tally()
        .args(["add", "-110.00", "Feast", "--category", "Food", "--date", "2024-05-03"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "ALERT: budget exceeded for Food (spent 110.00 of 100.00)",
        ));

    env.tally()
        .args(["budget", "list", "--month", "2024-05"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[!! OVER BUDGET !!]"));

    env.tally()
        .args(["budget", "add", "--category", "Food", "--amount", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must be positive"));
}

#[test]
fn report_for_month() {
    let env = Env::new();
    env.tally()
        .args(["add", "1000", "Salary", "-c", "Income", "-d", "2024-05-01"])
        .assert()
        .success();
    env.tally()
        .args(["add", "-200", "Rent", "-c", "Housing", "-d", "2024-05-02"])
        .assert()
        .success();

    env.tally()
        .args(["report", "--year", "2024", "--month", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Monthly Report: 2024-05"))
        .stdout(predicate::str::contains("1000.00"))
        .stdout(predicate::str::contains("-200.00"))
        .stdout(predicate::str::contains("800.00"));

    env.tally()
        .args(["report", "--year", "2024", "--month", "6"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No transactions found for this month."));
}

#[test]
fn delete_unknown_id_fails() {
    let env = Env::new();
    env.tally()
        .args(["delete", "99"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("error: Transaction 99 not found"));
}

#[test]
fn db_path_can_come_from_env() {
    let env = Env::new();
    let db = env.path("from-env.db");
    let mut cmd = Command::cargo_bin("tally").unwrap();
    cmd.env("TALLY_DB", &db)
        .env("XDG_CONFIG_HOME", env.path("config"))
        .args(["add", "5", "Found money"])
        .assert()
        .success();
    assert!(db.exists());
}
