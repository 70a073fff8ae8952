use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn piri_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("piri");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(
        files_dir.join("rn-465.txt"),
        "A RN 465 consolida as regras de cobertura obrigatória. Os prazos máximos \
         de atendimento são definidos por resolução. A amplitude da rede \
         credenciada deve ser compatível com o plano contratado.",
    )
    .unwrap();
    fs::write(
        files_dir.join("carencia.txt"),
        "A carência máxima é de cento e oitenta dias.",
    )
    .unwrap();
    fs::write(
        files_dir.join("contrato-a.txt"),
        "Contrato da Empresa A. Coparticipação de trinta por cento em consultas. \
         Rede regional sudeste. Reajuste anual pela sinistralidade do grupo.",
    )
    .unwrap();
    fs::write(
        files_dir.join("contrato-b.txt"),
        "Contrato da Empresa B. Sem coparticipação. Rede nacional completa. \
         Carência zero para acidentes.",
    )
    .unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/piri.sqlite"

[chunking]
chunk_size = 120
overlap = 30

[embedding]
provider = "hash"
dims = 64

[router]
default_agent = "legal"

[server]
bind = "127.0.0.1:7441"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("piri.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_piri(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = piri_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run piri binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

/// Parse the `  id: <uuid>` line from `clients add` output.
fn parse_client_id(stdout: &str) -> String {
    stdout
        .lines()
        .find_map(|l| l.trim().strip_prefix("id: "))
        .expect("clients add output should contain an id line")
        .to_string()
}

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_piri(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_piri(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_piri(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_clients_add_and_list() {
    let (tmp, config_path) = setup_test_env();
    run_piri(&config_path, &["init"]);

    let (stdout, stderr, success) = run_piri(&config_path, &["clients", "add", "Empresa Exemplo"]);
    assert!(success, "clients add failed: {}{}", stdout, stderr);
    let id = parse_client_id(&stdout);

    let (stdout, _, success) = run_piri(&config_path, &["clients", "list"]);
    assert!(success);
    assert!(stdout.contains("Empresa Exemplo"));
    assert!(stdout.contains(&id));

    drop(tmp);
}

#[test]
fn test_ingest_kb_document() {
    let (tmp, config_path) = setup_test_env();
    run_piri(&config_path, &["init"]);

    let file = tmp.path().join("files").join("rn-465.txt");
    let (stdout, stderr, success) =
        run_piri(&config_path, &["ingest", "kb", file.to_str().unwrap()]);
    assert!(success, "ingest failed: {}{}", stdout, stderr);
    assert!(stdout.contains("chunks written:"));
    assert!(stdout.contains("ok"));

    // Every chunk embedded inline with the hash provider.
    let chunks: usize = stdout
        .lines()
        .find_map(|l| l.trim().strip_prefix("chunks written: "))
        .unwrap()
        .parse()
        .unwrap();
    let embedded: usize = stdout
        .lines()
        .find_map(|l| l.trim().strip_prefix("embeddings written: "))
        .unwrap()
        .parse()
        .unwrap();
    assert!(chunks > 1, "expected multiple chunks, got {}", chunks);
    assert_eq!(chunks, embedded);
}

#[test]
fn test_reingest_replaces_not_appends() {
    let (tmp, config_path) = setup_test_env();
    run_piri(&config_path, &["init"]);

    let file = tmp.path().join("files").join("rn-465.txt");
    let (stdout1, _, _) = run_piri(&config_path, &["ingest", "kb", file.to_str().unwrap()]);
    let (stdout2, _, _) = run_piri(&config_path, &["ingest", "kb", file.to_str().unwrap()]);

    let count = |out: &str| -> String {
        out.lines()
            .find_map(|l| l.trim().strip_prefix("chunks written: "))
            .unwrap()
            .to_string()
    };
    assert_eq!(count(&stdout1), count(&stdout2));

    // Same document id on both runs.
    let doc_id = |out: &str| -> String {
        out.lines()
            .find_map(|l| l.trim().strip_prefix("document id: "))
            .unwrap()
            .to_string()
    };
    assert_eq!(doc_id(&stdout1), doc_id(&stdout2));
}

#[test]
fn test_query_empty_store() {
    let (_tmp, config_path) = setup_test_env();
    run_piri(&config_path, &["init"]);

    let (stdout, _, success) = run_piri(&config_path, &["query", "carência"]);
    assert!(success, "query on empty store should not fail");
    assert!(stdout.contains("No results."));
}

#[test]
fn test_query_exact_chunk_text_ranks_first() {
    let (tmp, config_path) = setup_test_env();
    run_piri(&config_path, &["init"]);

    // Single-chunk document: the stored chunk text equals the file content.
    let file = tmp.path().join("files").join("carencia.txt");
    run_piri(&config_path, &["ingest", "kb", file.to_str().unwrap()]);

    let (stdout, stderr, success) = run_piri(
        &config_path,
        &["query", "A carência máxima é de cento e oitenta dias."],
    );
    assert!(success, "query failed: {}{}", stdout, stderr);

    // Identical text gives an identical hash vector, so similarity is 1.
    let first = stdout.lines().next().unwrap();
    assert!(first.starts_with("1. [1.0000]"), "got: {}", first);
    assert!(first.contains("carencia"));
    assert!(stdout.contains("[Knowledge Base] carencia:"));
}

#[test]
fn test_query_client_isolation() {
    let (tmp, config_path) = setup_test_env();
    run_piri(&config_path, &["init"]);

    let (out_a, _, _) = run_piri(&config_path, &["clients", "add", "Empresa A"]);
    let (out_b, _, _) = run_piri(&config_path, &["clients", "add", "Empresa B"]);
    let id_a = parse_client_id(&out_a);
    let id_b = parse_client_id(&out_b);

    let file_a = tmp.path().join("files").join("contrato-a.txt");
    let file_b = tmp.path().join("files").join("contrato-b.txt");
    run_piri(
        &config_path,
        &["ingest", "client", &id_a, file_a.to_str().unwrap()],
    );
    run_piri(
        &config_path,
        &["ingest", "client", &id_b, file_b.to_str().unwrap()],
    );

    // Scoped to B, A's contract must never appear — even when the query
    // text comes from A's document.
    let (stdout, _, success) = run_piri(
        &config_path,
        &["query", "Coparticipação de trinta por cento", "--client", &id_b],
    );
    assert!(success);
    assert!(!stdout.contains("contrato-a"), "leaked: {}", stdout);
}

#[test]
fn test_query_unknown_client_fails() {
    let (_tmp, config_path) = setup_test_env();
    run_piri(&config_path, &["init"]);

    let (_, stderr, success) = run_piri(&config_path, &["query", "carência", "--client", "ghost"]);
    assert!(!success);
    assert!(stderr.contains("unknown client"));
}

#[test]
fn test_route_selects_personas() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_piri(
        &config_path,
        &["route", "Qual a carência segundo a RN 465 da ANS?"],
    );
    assert!(success);
    assert!(stdout.starts_with("legal"));

    let (stdout, _, _) = run_piri(
        &config_path,
        &["route", "Aponte os gaps e ofensores deste contrato"],
    );
    assert!(stdout.starts_with("contract"));

    let (stdout, _, _) = run_piri(
        &config_path,
        &["route", "Como está a sinistralidade do mercado?"],
    );
    assert!(stdout.starts_with("commercial"));

    // No keywords: configured default.
    let (stdout, _, _) = run_piri(&config_path, &["route", "bom dia"]);
    assert!(stdout.starts_with("legal"));
}

#[test]
fn test_route_deterministic() {
    let (_tmp, config_path) = setup_test_env();

    let (a, _, _) = run_piri(&config_path, &["route", "análise de cláusula do contrato"]);
    let (b, _, _) = run_piri(&config_path, &["route", "análise de cláusula do contrato"]);
    assert_eq!(a, b);
}

#[test]
fn test_agents_lists_personas() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_piri(&config_path, &["agents"]);
    assert!(success);
    for name in ["legal", "contract", "commercial", "care"] {
        assert!(stdout.contains(name), "missing persona {}", name);
    }
    assert!(stdout.contains("(default)"));
}

#[test]
fn test_chat_fails_when_llm_disabled() {
    let (_tmp, config_path) = setup_test_env();
    run_piri(&config_path, &["init"]);

    let (_, stderr, success) = run_piri(&config_path, &["chat", "Qual a carência?"]);
    assert!(!success, "chat should fail with llm disabled");
    assert!(stderr.contains("disabled"));
}

#[test]
fn test_embed_pending_and_rebuild() {
    let (tmp, config_path) = setup_test_env();
    run_piri(&config_path, &["init"]);

    let file = tmp.path().join("files").join("rn-465.txt");
    run_piri(&config_path, &["ingest", "kb", file.to_str().unwrap()]);

    // Inline embedding already covered everything.
    let (stdout, _, success) = run_piri(&config_path, &["embed", "pending"]);
    assert!(success);
    assert!(stdout.contains("all chunks up to date"));

    // Rebuild clears and regenerates.
    let (stdout, _, success) = run_piri(&config_path, &["embed", "rebuild"]);
    assert!(success, "rebuild failed: {}", stdout);
    assert!(stdout.contains("cleared existing embeddings"));

    let (stdout, _, _) = run_piri(&config_path, &["embed", "pending", "--dry-run"]);
    assert!(stdout.contains("chunks needing embeddings: 0"));
}

#[test]
fn test_invalid_config_rejected() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("piri.toml");
    fs::write(
        &config_path,
        "[db]\npath = \"/tmp/x.sqlite\"\n\n[chunking]\nchunk_size = 100\noverlap = 200\n",
    )
    .unwrap();

    let (_, stderr, success) = run_piri(&config_path, &["agents"]);
    assert!(!success);
    assert!(stderr.contains("overlap"));
}
