use crate::output;

use std::path::PathBuf;

use clap::Args;
use color_eyre::Result;

use fedflow::{
    data_transform, evaluation, hetero_learner, intersection, progress_channel, reader,
    ComponentHandle, Config, Data, ExecutionEvent, LocalRunner, PartyId, Pipeline, PredictInput,
    ProgressReceiver, Role, RoleTable,
};
use serde_json::json;

/// Run the reference hetero-regression pipeline end to end
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the YAML run configuration (parties, backend, work_mode)
    pub config: PathBuf,

    /// Namespace suffix for the train/score tables
    #[arg(long, short = 'n', default_value = "")]
    pub namespace: String,

    /// Fit only; skip deploy and predict
    #[arg(long)]
    pub skip_predict: bool,
}

pub async fn execute(args: RunArgs) -> Result<()> {
    if !args.config.exists() {
        color_eyre::eyre::bail!("Config file not found: {}", args.config.display());
    }

    output::status("Loading", &format!("{}", args.config.display()));
    let config = Config::load(&args.config)?;

    let guest = first_party(&config.parties, Role::Guest)?;
    let host = first_party(&config.parties, Role::Host)?;
    let arbiter = first_party(&config.parties, Role::Arbiter)?;
    output::info(&format!(
        "parties: guest={guest} host={host} arbiter={arbiter}, backend={}, work_mode={}",
        config.backend, config.work_mode
    ));

    let namespace = format!("experiment{}", args.namespace);
    let (tx, rx) = progress_channel();
    let printer = tokio::spawn(render_events(rx));

    let mut pipeline = Pipeline::new();
    pipeline
        .set_initiator(Role::Guest, guest)?
        .set_roles(config.parties.clone())?
        .with_progress(tx.clone());

    let reader_0 = pipeline.add_component(
        reader("reader_0")
            .with_role_param(
                Role::Guest,
                "table",
                json!({"name": "dvisits_hetero_guest", "namespace": namespace}),
            )?
            .with_role_param(
                Role::Host,
                "table",
                json!({"name": "dvisits_hetero_host", "namespace": namespace}),
            )?,
        Data::new(),
    )?;
    let data_transform_0 = pipeline.add_component(
        data_transform("data_transform_0")
            .with_role_param(Role::Guest, "with_label", json!(true))?
            .with_role_param(Role::Guest, "label_name", json!("doctorco"))?
            .with_role_param(Role::Guest, "label_type", json!("float"))?
            .with_role_param(Role::Guest, "output_format", json!("dense"))?
            .with_role_param(Role::Host, "with_label", json!(false))?,
        Data::data(reader_0.output("data")),
    )?;
    let intersection_0 = pipeline.add_component(
        intersection("intersection_0"),
        Data::data(data_transform_0.output("data")),
    )?;
    let hetero_regression_0 = pipeline.add_component(
        hetero_learner("hetero_regression_0")
            .with_param("early_stop", json!("weight_diff"))?
            .with_param("max_iter", json!(20))?
            .with_param("alpha", json!(100))?
            .with_param("batch_size", json!(-1))?
            .with_param("learning_rate", json!(0.01))?
            .with_param("init_param", json!({"init_method": "zeros"}))?
            .with_param("encrypted_mode_calculator_param", json!({"mode": "fast"}))?,
        Data::train_data(intersection_0.output("data")),
    )?;
    pipeline.add_component(
        evaluation("evaluation_0")
            .with_param("eval_type", json!("regression"))?
            .with_param("pos_label", json!(1))?,
        Data::data(hetero_regression_0.output("data")),
    )?;

    output::status("Compiling", "training graph");
    pipeline.compile()?;

    let runner = LocalRunner::new();
    output::status("Fitting", "5 stages across 3 roles");
    pipeline
        .fit(&runner, config.backend, config.work_mode)
        .await?;
    output::success("fit completed");

    print_component(&pipeline, "hetero_regression_0");
    print_component(&pipeline, "evaluation_0");

    if !args.skip_predict {
        run_predict(
            &pipeline,
            &[&data_transform_0, &hetero_regression_0],
            &config,
            &namespace,
            guest,
            tx.clone(),
        )
        .await?;
    }

    drop(tx);
    drop(pipeline);
    printer.await?;
    Ok(())
}

async fn run_predict(
    pipeline: &Pipeline,
    deployed_components: &[&ComponentHandle],
    config: &Config,
    namespace: &str,
    guest: PartyId,
    tx: fedflow::ProgressSender,
) -> Result<()> {
    output::status("Deploying", "data_transform_0, hetero_regression_0");
    let deployed = pipeline.deploy_component(deployed_components)?;

    let mut predict_pipeline = Pipeline::new();
    predict_pipeline.with_progress(tx);
    let reader_1 = predict_pipeline.add_component(
        reader("reader_1")
            .with_role_param(
                Role::Guest,
                "table",
                json!({"name": "dvisits_hetero_guest", "namespace": namespace}),
            )?
            .with_role_param(
                Role::Host,
                "table",
                json!({"name": "dvisits_hetero_host", "namespace": namespace}),
            )?,
        Data::new(),
    )?;
    let entry = deployed
        .entry("data_transform_0", "data")
        .ok_or_else(|| color_eyre::eyre::eyre!("deployed subgraph has no open data entry"))?;
    predict_pipeline.add_deployed(&deployed, PredictInput::new().map(entry, reader_1.output("data")))?;

    output::status("Predicting", "scoring with deployed subgraph");
    predict_pipeline
        .predict(&LocalRunner::new(), config.backend, config.work_mode)
        .await?;
    output::success("predict completed");

    if let Some(record) = predict_pipeline.get_component("hetero_regression_0") {
        if let Some(scores) = record.output(guest, "data") {
            output::result_block(
                "predictions (guest)",
                &serde_json::to_string_pretty(scores)?,
            );
        }
    }
    Ok(())
}

fn first_party(parties: &RoleTable, role: Role) -> Result<PartyId> {
    parties
        .parties(role)
        .first()
        .copied()
        .ok_or_else(|| color_eyre::eyre::eyre!("config names no {role} party"))
}

fn print_component(pipeline: &Pipeline, name: &str) {
    if let Some(record) = pipeline.get_component(name) {
        if let Some(model) = record.model_param() {
            if let Ok(body) = serde_json::to_string_pretty(model) {
                output::result_block(&format!("{name} model param"), &body);
            }
        }
        if let Ok(body) = serde_json::to_string_pretty(record.summary()) {
            output::result_block(&format!("{name} summary"), &body);
        }
    }
}

async fn render_events(mut rx: ProgressReceiver) {
    while let Some(event) = rx.recv().await {
        match event {
            ExecutionEvent::PipelineStarted { mode, total_stages } => {
                output::info(&format!("run started: {mode:?}, {total_stages} stages"));
            }
            ExecutionEvent::StageStarted {
                component,
                kind,
                total_parties,
                ..
            } => {
                output::stage_header(&component, kind.as_str(), total_parties);
            }
            ExecutionEvent::TaskCompleted {
                role,
                party,
                duration,
                ..
            } => {
                output::task_line(
                    role.as_str(),
                    &party.to_string(),
                    &format!("done in {}ms", duration.as_millis()),
                );
            }
            ExecutionEvent::StageFailed {
                component,
                role,
                party,
                message,
            } => {
                output::failure(&format!("{component} failed on {role}[{party}]: {message}"));
            }
            ExecutionEvent::PipelineCompleted {
                success, duration, ..
            } => {
                if success {
                    output::success(&format!("run finished in {}ms", duration.as_millis()));
                } else {
                    output::failure("run aborted");
                }
            }
            _ => {}
        }
    }
}
