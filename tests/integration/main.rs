//! Integration tests for Agentpack

mod cli_tests {
    use agentpack::testing::{java_agent_archive, php_agent_archive, seed_cache, write_buildpack};
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn agentpack() -> Command {
        let mut cmd = cargo_bin_cmd!("agentpack");
        for var in [
            "CNB_BUILDPACK_DIR",
            "CNB_PLATFORM_DIR",
            "CNB_STACK_ID",
            "SERVICE_BINDING_ROOT",
            "PHP_EXTENSION_DIR",
            "BP_APPD_EXT_CONF_URI",
        ] {
            cmd.env_remove(var);
        }
        cmd
    }

    /// Buildpack with the given agents bundled under dependencies/
    fn buildpack(dir: &Path, agents: &[(&str, &str, Vec<u8>)]) {
        let dependencies: Vec<_> = agents
            .iter()
            .map(|(id, file, bytes)| seed_cache(&dir.join("dependencies"), id, file, bytes))
            .collect();
        write_buildpack(dir, &dependencies);
    }

    #[test]
    fn help_displays() {
        agentpack()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("injects an APM agent"));
    }

    #[test]
    fn version_displays() {
        agentpack()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("agentpack"));
    }

    #[test]
    fn detect_passes_with_binding() {
        let temp = TempDir::new().unwrap();
        let binding = temp.path().join("platform/bindings/appd");
        std::fs::create_dir_all(&binding).unwrap();
        std::fs::write(binding.join("type"), "AppDynamics").unwrap();
        let plan = temp.path().join("plan.toml");

        agentpack()
            .arg("detect")
            .arg("--platform")
            .arg(temp.path().join("platform"))
            .arg("--plan")
            .arg(&plan)
            .assert()
            .success();

        let content = std::fs::read_to_string(&plan).unwrap();
        assert!(content.contains("agent-java"));
        assert!(content.contains("jvm-application"));
        assert!(content.contains("node_modules"));
        assert!(content.contains("agent-php"));
    }

    #[test]
    fn detect_fails_without_binding() {
        let temp = TempDir::new().unwrap();
        let plan = temp.path().join("plan.toml");

        agentpack()
            .arg("detect")
            .arg("--platform")
            .arg(temp.path())
            .arg("--plan")
            .arg(&plan)
            .assert()
            .code(100)
            .stdout(predicate::str::contains("SKIPPED"));

        assert!(!plan.exists());
    }

    #[test]
    fn build_contributes_java_agent() {
        let temp = TempDir::new().unwrap();
        let bp = temp.path().join("buildpack");
        buildpack(&bp, &[("agent-java", "agent-java.zip", java_agent_archive())]);
        let layers = temp.path().join("layers");
        std::fs::create_dir_all(&layers).unwrap();
        let plan = temp.path().join("plan.toml");
        std::fs::write(&plan, "[[entries]]\nname = \"agent-java\"\n").unwrap();

        agentpack()
            .arg("build")
            .arg("--buildpack")
            .arg(&bp)
            .arg("--layers")
            .arg(&layers)
            .arg("--plan")
            .arg(&plan)
            .arg("--app")
            .arg(temp.path())
            .arg("--download-dir")
            .arg(temp.path().join("downloads"))
            .assert()
            .success();

        assert!(layers.join("agent-java/javaagent.jar").is_file());
        assert!(layers.join("agent-java.toml").is_file());
        assert!(layers.join("agent-java.sbom.syft.json").is_file());
        assert!(layers
            .join("agent-java/env.launch/JAVA_TOOL_OPTIONS.append")
            .is_file());
        let bom = std::fs::read_to_string(layers.join("bom.json")).unwrap();
        assert!(bom.contains("\"layer\": \"agent-java\""));
    }

    #[test]
    fn build_php_without_extension_dir_fails() {
        let temp = TempDir::new().unwrap();
        let bp = temp.path().join("buildpack");
        buildpack(&bp, &[("agent-php", "agent-php.tar.bz2", php_agent_archive())]);
        let layers = temp.path().join("layers");
        std::fs::create_dir_all(&layers).unwrap();
        let plan = temp.path().join("plan.toml");
        std::fs::write(&plan, "[[entries]]\nname = \"agent-php\"\n").unwrap();

        agentpack()
            .arg("build")
            .arg("--buildpack")
            .arg(&bp)
            .arg("--layers")
            .arg(&layers)
            .arg("--plan")
            .arg(&plan)
            .arg("--download-dir")
            .arg(temp.path().join("downloads"))
            .assert()
            .failure()
            .stderr(predicate::str::contains("unable to find $PHP_EXTENSION_DIR"));

        assert!(!layers.join("agent-php.toml").exists());
        assert!(!layers.join("bom.json").exists());
    }

    #[test]
    fn build_without_dependency_fails() {
        let temp = TempDir::new().unwrap();
        let bp = temp.path().join("buildpack");
        buildpack(&bp, &[]);
        let plan = temp.path().join("plan.toml");
        std::fs::write(&plan, "[[entries]]\nname = \"agent-nodejs\"\n").unwrap();

        agentpack()
            .arg("build")
            .arg("--buildpack")
            .arg(&bp)
            .arg("--layers")
            .arg(temp.path().join("layers"))
            .arg("--plan")
            .arg(&plan)
            .assert()
            .failure()
            .stderr(predicate::str::contains("no dependency agent-nodejs"));
    }
}

mod scenarios {
    use agentpack::build::Build;
    use agentpack::dependency::cache::sha256_bytes;
    use agentpack::error::AgentpackError;
    use agentpack::layer::LayerStore;
    use agentpack::plan::BuildpackPlan;
    use agentpack::testing::{
        external_configuration_archive, java_agent_archive, nodejs_agent_archive,
        php_agent_archive, Harness,
    };
    use std::collections::BTreeSet;
    use std::path::Path;

    const VERSION_DIR: &str = "ver21.11.2.33305";

    fn files(root: &Path) -> BTreeSet<String> {
        fn walk(root: &Path, dir: &Path, out: &mut BTreeSet<String>) {
            for entry in std::fs::read_dir(dir).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    walk(root, &path, out);
                } else {
                    out.insert(path.strip_prefix(root).unwrap().display().to_string());
                }
            }
        }
        let mut out = BTreeSet::new();
        walk(root, root, &mut out);
        out
    }

    fn java_harness() -> Harness {
        let harness = Harness::new();
        let dependency = harness.seed("agent-java", "agent-java.zip", &java_agent_archive());
        harness.with_dependency(dependency)
    }

    #[tokio::test]
    async fn java_without_external_configuration() {
        let harness = java_harness();
        let plan = BuildpackPlan::from_names(["agent-java"]);
        let mut store = LayerStore::in_memory();

        let result = Build::plan(&plan, &harness.context())
            .unwrap()
            .run(&harness.context(), &mut store)
            .await
            .unwrap();

        let layer = &result.layers[0];
        let expected: BTreeSet<String> = [
            "javaagent.jar".to_string(),
            format!("{VERSION_DIR}/javaagent.jar"),
            format!("{VERSION_DIR}/conf/controller-info.xml"),
            format!("{VERSION_DIR}/lib/agent.jar"),
            format!("{VERSION_DIR}/conf/app-agent-config.xml"),
            format!("{VERSION_DIR}/conf/custom-activity-correlation.xml"),
            format!("{VERSION_DIR}/conf/logging/log4j2.xml"),
            "env.launch/JAVA_TOOL_OPTIONS.append".to_string(),
            "env.launch/JAVA_TOOL_OPTIONS.delim".to_string(),
        ]
        .into_iter()
        .collect();
        assert_eq!(files(&layer.path), expected);
        assert!(layer.path.join(VERSION_DIR).join("logs").is_dir());

        assert_eq!(layer.launch_env.mutations().len(), 1);
        assert_eq!(result.bom.entries().len(), 1);
        assert_eq!(result.bom.entries()[0].layer(), Some("agent-java"));
    }

    #[tokio::test]
    async fn java_with_external_configuration() {
        let archive = external_configuration_archive();
        let harness = java_harness();
        let source = harness.root.path().join("external.tar.gz");
        std::fs::write(&source, &archive).unwrap();
        let harness = harness
            .with_env("BP_APPD_EXT_CONF_URI", &format!("file://{}", source.display()))
            .with_env("BP_APPD_EXT_CONF_VERSION", "1.0.0")
            .with_env("BP_APPD_EXT_CONF_SHA256", &sha256_bytes(&archive))
            .with_env("BP_APPD_EXT_CONF_STRIP", "1");
        let plan = BuildpackPlan::from_names(["agent-java"]);
        let mut store = LayerStore::in_memory();

        let result = Build::plan(&plan, &harness.context())
            .unwrap()
            .run(&harness.context(), &mut store)
            .await
            .unwrap();

        let layer = &result.layers[0];
        assert!(layer
            .path
            .join(VERSION_DIR)
            .join("conf/external.properties")
            .is_file());
        assert!(layer
            .path
            .join(VERSION_DIR)
            .join("conf/app-agent-config.xml")
            .is_file());

        let names: Vec<_> = result
            .bom
            .entries()
            .iter()
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(names, vec!["agent-java", "appdynamics-external-configuration"]);
    }

    #[tokio::test]
    async fn php_without_extension_dir() {
        let harness = Harness::new();
        let dependency = harness.seed("agent-php", "agent-php.tar.bz2", &php_agent_archive());
        let harness = harness.with_dependency(dependency);
        let plan = BuildpackPlan::from_names(["agent-php"]);
        let mut store = LayerStore::in_memory();

        let err = Build::plan(&plan, &harness.context())
            .unwrap()
            .run(&harness.context(), &mut store)
            .await
            .unwrap_err();

        assert!(matches!(err.root(), AgentpackError::Configuration(_)));
        assert!(harness.executor.calls().is_empty());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn repeated_builds_reuse_layer() {
        let harness = java_harness();
        let plan = BuildpackPlan::from_names(["agent-java"]);

        let mut store = LayerStore::load(&harness.layers_dir).await.unwrap();
        let build = Build::plan(&plan, &harness.context()).unwrap();
        let first = build.run(&harness.context(), &mut store).await.unwrap();

        // A rebuild would wipe this file
        let marker = first.layers[0].path.join("marker");
        std::fs::write(&marker, b"kept").unwrap();

        let mut store = LayerStore::load(&harness.layers_dir).await.unwrap();
        let second = build.run(&harness.context(), &mut store).await.unwrap();

        assert!(marker.is_file());
        assert_eq!(first.layers[0].path, second.layers[0].path);
        assert_eq!(first.layers[0].types, second.layers[0].types);
        assert_eq!(first.bom, second.bom);
    }

    #[tokio::test]
    async fn nodejs_patch_is_idempotent_across_builds() {
        let harness = Harness::new();
        let dependency = harness.seed("agent-nodejs", "agent-nodejs.tgz", &nodejs_agent_archive());
        let harness = harness.with_dependency(dependency);
        std::fs::write(harness.app_dir.join("package.json"), r#"{ "main": "server.js" }"#).unwrap();
        std::fs::write(harness.app_dir.join("server.js"), "listen();\n").unwrap();
        let plan = BuildpackPlan::from_names(["agent-nodejs"]);
        let mut store = LayerStore::in_memory();
        let build = Build::plan(&plan, &harness.context()).unwrap();

        build.run(&harness.context(), &mut store).await.unwrap();
        let patched = std::fs::read(harness.app_dir.join("server.js")).unwrap();
        build.run(&harness.context(), &mut store).await.unwrap();

        assert_eq!(patched, b"require('appdynamics');\nlisten();\n");
        assert_eq!(std::fs::read(harness.app_dir.join("server.js")).unwrap(), patched);
        assert_eq!(harness.executor.calls().len(), 1);
    }
}
