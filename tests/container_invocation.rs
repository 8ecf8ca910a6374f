// tests/container_invocation.rs

use std::fs;

use dagrun::dag::{DeployType, ScheduledTask, SecretRef, Task, TaskPayload};
use dagrun::exec::ContainerExecutor;
use dagrun::exec::container::container_name;
use dagrun::exec::secrets::{ResolvedSecret, resolve, resolve_all};

fn scheduled(name: &str, payload: TaskPayload) -> ScheduledTask {
    ScheduledTask::from_task(
        &Task {
            name: name.to_string(),
            payload,
        },
        3,
    )
}

fn env_secret() -> SecretRef {
    SecretRef {
        deploy_type: DeployType::Env,
        deploy_target: "SQL_CONN".into(),
        secret: "airflow-secrets".into(),
        key: Some("sql_alchemy_conn".into()),
    }
}

fn volume_secret() -> SecretRef {
    SecretRef {
        deploy_type: DeployType::Volume,
        deploy_target: "/etc/sql_conn".into(),
        secret: "airflow-secrets".into(),
        key: None,
    }
}

#[test]
fn invocation_includes_image_entrypoint_and_args() {
    let mut payload = TaskPayload::container("automl.trn:latest", ["echo", "TRN_1"])
        .with_env("SEED", "42");
    payload.args = vec!["--fast".into()];
    payload.namespace = Some("default".into());

    let exec = ContainerExecutor::new("podman");
    let inv = exec.invocation(&scheduled("trn_1", payload)).unwrap();

    assert_eq!(inv.program, "podman");
    assert_eq!(
        inv.args,
        [
            "run",
            "--rm",
            "--name",
            container_name("trn_1", 3).as_str(),
            "--label",
            "dagrun.task=trn_1",
            "--label",
            "dagrun.namespace=default",
            "-e",
            "SEED=42",
            "--entrypoint",
            "echo",
            "automl.trn:latest",
            "TRN_1",
            "--fast",
        ]
    );
    assert!(inv.env.is_empty());
}

#[test]
fn image_entrypoint_is_kept_when_cmds_are_empty() {
    let payload = TaskPayload {
        image: Some("busybox".into()),
        ..TaskPayload::default()
    };
    let inv = ContainerExecutor::default()
        .invocation(&scheduled("plain", payload))
        .unwrap();

    assert_eq!(inv.program, "docker");
    assert!(!inv.args.iter().any(|a| a == "--entrypoint"));
    assert_eq!(inv.args.last().map(String::as_str), Some("busybox"));
}

#[test]
fn task_without_image_cannot_run_in_a_container() {
    let err = ContainerExecutor::default()
        .invocation(&scheduled("bare", TaskPayload::command(["true"])))
        .unwrap_err();
    assert!(err.to_string().contains("no container image"));
}

#[test]
fn secrets_are_injected_without_leaking_values_into_args() {
    let dir = tempfile::tempdir().unwrap();
    let secret_dir = dir.path().join("airflow-secrets");
    fs::create_dir_all(&secret_dir).unwrap();
    fs::write(secret_dir.join("sql_alchemy_conn"), "postgres://db\n").unwrap();

    let mut payload = TaskPayload::container("automl.sel:latest", ["echo", "SEL"]);
    payload.secrets = vec![env_secret(), volume_secret()];

    let exec = ContainerExecutor::new("docker").with_secrets_dir(dir.path());
    let inv = exec.invocation(&scheduled("sel", payload)).unwrap();

    assert_eq!(inv.env, [("SQL_CONN".to_string(), "postgres://db".to_string())]);
    assert!(inv.args.windows(2).any(|w| w[0] == "-e" && w[1] == "SQL_CONN"));
    assert!(!inv.args.iter().any(|a| a.contains("postgres://db")));

    let mount = format!("{}:/etc/sql_conn:ro", secret_dir.display());
    assert!(inv.args.windows(2).any(|w| w[0] == "-v" && w[1] == mount));
}

#[test]
fn container_names_are_sanitized() {
    let payload = TaskPayload::container("img", Vec::<String>::new());
    let inv = ContainerExecutor::default()
        .invocation(&scheduled("train model/v2", payload))
        .unwrap();
    assert!(inv.args.contains(&container_name("train model/v2", 3)));
}

#[test]
fn container_names_differ_per_run_and_process() {
    let name = container_name("afe", 1);
    assert_eq!(name, format!("dagrun-afe-{}-1", std::process::id()));
    assert_ne!(name, container_name("afe", 2));
}

#[test]
fn removal_targets_the_task_container() {
    let exec = ContainerExecutor::new("podman");
    let task = scheduled("trn_1", TaskPayload::container("automl.trn:latest", ["echo"]));

    let launch = exec.invocation(&task).unwrap();
    let removal = exec.removal(&task);

    assert_eq!(removal.program, "podman");
    assert_eq!(removal.args, ["rm", "-f", container_name("trn_1", 3).as_str()]);
    assert!(launch.args.contains(&removal.args[2]));
}

#[test]
fn secret_resolution_needs_a_directory_and_existing_files() {
    assert!(resolve(&env_secret(), None).is_err());

    let dir = tempfile::tempdir().unwrap();
    assert!(resolve(&env_secret(), Some(dir.path())).is_err());
    assert!(resolve(&volume_secret(), Some(dir.path())).is_err());

    let secret_dir = dir.path().join("airflow-secrets");
    fs::create_dir_all(&secret_dir).unwrap();
    fs::write(secret_dir.join("sql_alchemy_conn"), "value").unwrap();

    let resolved = resolve_all(&[env_secret(), volume_secret()], Some(dir.path())).unwrap();
    assert_eq!(
        resolved,
        [
            ResolvedSecret::Env {
                name: "SQL_CONN".into(),
                value: "value".into(),
            },
            ResolvedSecret::Volume {
                source: secret_dir,
                target: "/etc/sql_conn".into(),
            },
        ]
    );
}
