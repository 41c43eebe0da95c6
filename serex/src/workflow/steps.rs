//! Standard workflow catalogs.
//!
//! Each catalog builds the ordered step list for one provisioning job.
//! Optional artifacts (bundle, boot image, guest-OS image) drop their steps
//! from the list when unset; the step bodies themselves never branch on
//! configuration.

use std::path::PathBuf;

use futures_util::FutureExt;

use super::Workflow;
use crate::config::ProvisionConfig;
use crate::template::{ConfigTemplate, TemplateParams};

/// The full image-provisioning sequence: enable, quiet the console, pull
/// artifacts over TFTP, install, select the boot image, restore console
/// logging, reload.
pub fn provisioning_workflow(config: &ProvisionConfig) -> Workflow {
    let has_bundle = config.bundle_name.is_some();
    let has_image = config.image_name.is_some();
    let has_guest_os = config.guest_os_name.is_some();

    let workflow = Workflow::new("provision");

    let workflow = {
        let password = config.enable_password.clone();
        workflow.step("enter enable mode", move |s| {
            let password = password.clone();
            async move { s.enter_enable(&password).await }.boxed()
        })
    };

    let workflow = {
        let tftp = config.tftp_server.clone();
        workflow.step("resolve tftp server", move |s| {
            let tftp = tftp.clone();
            async move { s.resolve_tftp_server(tftp.as_deref()).await.map(|_| ()) }.boxed()
        })
    };

    let workflow =
        workflow.step("disable console logging", |s| {
            async move { s.set_console_logging(false).await }.boxed()
        });

    let workflow = {
        let tftp = config.tftp_server.clone();
        let bundle = config.bundle_name.clone().unwrap_or_default();
        workflow.step_if(has_bundle, "copy bundle to flash", move |s| {
            let tftp = tftp.clone();
            let bundle = bundle.clone();
            async move {
                let server = s.resolve_tftp_server(tftp.as_deref()).await?;
                s.copy_file_from_network(&server, &bundle, &bundle).await
            }
            .boxed()
        })
    };

    let workflow = {
        let tftp = config.tftp_server.clone();
        let guest = config.guest_os_name.clone().unwrap_or_default();
        workflow.step_if(has_guest_os, "copy guest-os image to flash", move |s| {
            let tftp = tftp.clone();
            let guest = guest.clone();
            async move {
                let server = s.resolve_tftp_server(tftp.as_deref()).await?;
                s.copy_file_from_network(&server, &guest, &guest).await
            }
            .boxed()
        })
    };

    let workflow = workflow.step("remove guest-os image", |s| {
        async move { s.remove_guest_image().await }.boxed()
    });

    let workflow = {
        let bundle = config.bundle_name.clone().unwrap_or_default();
        workflow.step_if(has_bundle, "install bundle", move |s| {
            let bundle = bundle.clone();
            async move { s.install_bundle(&bundle).await }.boxed()
        })
    };

    let workflow = {
        let image = config.image_name.clone().unwrap_or_default();
        workflow.step_if(has_image, "set boot image", move |s| {
            let image = image.clone();
            async move { s.set_boot_image(&image).await }.boxed()
        })
    };

    let workflow = {
        let guest = config.guest_os_name.clone().unwrap_or_default();
        workflow.step_if(has_guest_os, "install guest-os image", move |s| {
            let guest = guest.clone();
            async move { s.install_guest_image(&guest).await }.boxed()
        })
    };

    workflow
        .step("enable console logging", |s| {
            async move { s.set_console_logging(true).await }.boxed()
        })
        .step("reload", |s| async move { s.reload().await }.boxed())
}

/// Apply the per-device-type configuration template: look the template up
/// by the probed hardware type, render it with the addressing parameters,
/// and load it line by line.
pub fn configuration_workflow(
    template_dir: impl Into<PathBuf>,
    params: TemplateParams,
    config: &ProvisionConfig,
) -> Workflow {
    let template_dir = template_dir.into();

    let workflow = {
        let password = config.enable_password.clone();
        Workflow::new("configure").step("enter enable mode", move |s| {
            let password = password.clone();
            async move { s.enter_enable(&password).await }.boxed()
        })
    };

    workflow.step("apply configuration template", move |s| {
        let template_dir = template_dir.clone();
        let params = params.clone();
        async move {
            let device_type = s.identity().device_type;
            let template = ConfigTemplate::for_device(&template_dir, device_type)?;
            let lines = template.render(&params.for_device(device_type));
            s.apply_config(&lines).await
        }
        .boxed()
    })
}

/// Software equivalent of the reset button: wipe the startup configuration
/// and reload.
pub fn factory_reset_workflow(config: &ProvisionConfig) -> Workflow {
    let password = config.enable_password.clone();
    Workflow::new("factory reset")
        .step("enter enable mode", move |s| {
            let password = password.clone();
            async move { s.enter_enable(&password).await }.boxed()
        })
        .step("clear startup configuration", |s| {
            async move { s.clear_startup().await }.boxed()
        })
        .step("reload", |s| async move { s.reload().await }.boxed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::DeviceSession;
    use crate::transport::mock::{MockTransport, Rule};

    #[test]
    fn test_provisioning_steps_with_all_artifacts() {
        let config = ProvisionConfig::new()
            .with_bundle("bundle.bin")
            .with_image("image.bin")
            .with_guest_os("guest.bin");
        let workflow = provisioning_workflow(&config);
        let names: Vec<_> = workflow.step_names().collect();
        assert_eq!(
            names,
            vec![
                "enter enable mode",
                "resolve tftp server",
                "disable console logging",
                "copy bundle to flash",
                "copy guest-os image to flash",
                "remove guest-os image",
                "install bundle",
                "set boot image",
                "install guest-os image",
                "enable console logging",
                "reload",
            ]
        );
    }

    #[test]
    fn test_guest_os_steps_dropped_when_unset() {
        let config = ProvisionConfig::new()
            .with_bundle("bundle.bin")
            .with_image("image.bin");
        let workflow = provisioning_workflow(&config);
        let names: Vec<_> = workflow.step_names().collect();
        assert!(!names.contains(&"copy guest-os image to flash"));
        assert!(!names.contains(&"install guest-os image"));
        // removal still runs: the bundle may carry its own guest OS
        assert!(names.contains(&"remove guest-os image"));
    }

    #[test]
    fn test_factory_reset_steps() {
        let workflow = factory_reset_workflow(&ProvisionConfig::default());
        let names: Vec<_> = workflow.step_names().collect();
        assert_eq!(
            names,
            vec!["enter enable mode", "clear startup configuration", "reload"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_configuration_workflow_missing_template() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProvisionConfig::new().with_enable_password("cisco123");
        let workflow =
            configuration_workflow(dir.path(), TemplateParams::new("10", 42), &config);

        let (transport, _handle) =
            MockTransport::scripted("mock0", vec![Rule::on("\r", "Router#")]);
        let mut session = DeviceSession::new(Box::new(transport), &config);

        let outcome = workflow.run(&mut session).await;
        assert_eq!(outcome.failed_step(), Some("apply configuration template"));
        match outcome {
            crate::driver::StepOutcome::Failure { reason, .. } => {
                assert!(reason.contains("no configuration template"));
            }
            _ => panic!("expected failure"),
        }
    }
}
