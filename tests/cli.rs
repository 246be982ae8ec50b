use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const SANTANDER_CSV: &str = "\
Movimientos de la cuenta ES00 0000 0000 0000
F. Operación;F. Valor;Movimiento;Más datos;Importe;Saldo
01/03/2024;01/03/2024;SUPERMERCADO ABC;TARJETA 1234;-49,99;1.950,01
02/03/2024;02/03/2024;NOMINA;EMPRESA SL;1.500,00;3.450,01
03/03/2024;03/03/2024;TRASPASO AHORRO;PROPIA;-200,00;3.250,01
";

struct Env {
    config: TempDir,
    data: TempDir,
}

impl Env {
    fn new() -> Self {
        let env = Self {
            config: tempfile::tempdir().unwrap(),
            data: tempfile::tempdir().unwrap(),
        };
        env.cmd()
            .args(["init", "--data-dir"])
            .arg(env.data.path())
            .assert()
            .success()
            .stdout(predicate::str::contains("Initialized extracto"));
        env
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("extracto").unwrap();
        cmd.env("EXTRACTO_CONFIG_DIR", self.config.path())
            .env_remove("RUST_LOG");
        cmd
    }

    fn statement(&self) -> std::path::PathBuf {
        let path = self.data.path().join("santander.csv");
        std::fs::write(&path, SANTANDER_CSV).unwrap();
        path
    }
}

fn import(env: &Env, file: &Path) -> Command {
    let mut cmd = env.cmd();
    cmd.arg("import")
        .arg(file)
        .args(["--account", "checking"]);
    cmd
}

#[test]
fn sniff_reports_detected_layout() {
    let env = Env::new();
    let file = env.statement();
    env.cmd()
        .arg("sniff")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("santander"))
        .stdout(predicate::str::contains("3 candidate transactions"));
}

#[test]
fn dry_run_prints_payload_json() {
    let env = Env::new();
    let file = env.statement();
    import(&env, &file)
        .args(["--type", "4=TRASPASO", "--dest", "4=savings", "--dry-run", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""accountId": "checking""#))
        .stdout(predicate::str::contains(r#""type": "TRASPASO""#))
        .stdout(predicate::str::contains(r#""destinationAccountId": "savings""#))
        .stdout(predicate::str::contains(r#""amount": "49.99""#));
}

#[test]
fn transfer_without_destination_is_rejected() {
    let env = Env::new();
    let file = env.statement();
    import(&env, &file)
        .args(["--type", "4=TRASPASO"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Transfers without a destination account at rows: 4",
        ));
}

#[test]
fn committed_entries_show_in_ledger_and_flag_reimport() {
    let env = Env::new();
    let file = env.statement();
    import(&env, &file)
        .args(["--skip", "4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 transactions imported into checking."));

    env.cmd()
        .args(["ledger", "--account", "checking"])
        .assert()
        .success()
        .stdout(predicate::str::contains("SUPERMERCADO ABC - TARJETA 1234"))
        .stdout(predicate::str::contains("NOMINA - EMPRESA SL"))
        .stdout(predicate::str::contains("TRASPASO AHORRO").not());

    // Already committed rows come back deselected, so only row 4 remains.
    import(&env, &file)
        .args(["--dry-run", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("TRASPASO AHORRO - PROPIA"))
        .stdout(predicate::str::contains("NOMINA").not());
}

#[test]
fn normalized_records_import() {
    let env = Env::new();
    let file = env.data.path().join("records.json");
    std::fs::write(
        &file,
        r#"[
            {"date": "2024-03-01T00:00:00Z", "description": "CAFE", "amount": "2.20", "type": "GASTO"},
            {"date": "2024-03-02", "description": "A AHORRO", "amount": "-50", "type": "TRASPASO"}
        ]"#,
    )
    .unwrap();
    env.cmd()
        .arg("import")
        .arg(&file)
        .args(["--normalized", "--account", "checking", "--toggle", "1", "--dry-run", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""description": "CAFE""#))
        .stdout(predicate::str::contains("A AHORRO").not());
}

#[test]
fn missing_file_fails() {
    let env = Env::new();
    env.cmd()
        .args(["import", "/nonexistent/statement.csv", "--account", "checking"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No transactions found."));
}
