use fedflow::{
    data_transform, evaluation, hetero_learner, intersection, reader, Backend, Data, LocalRunner,
    PartyId, Pipeline, PredictInput, Role, RoleTable, WorkMode,
};
use serde_json::json;

#[tokio::main]
async fn main() -> fedflow::Result<()> {
    let guest = PartyId(9999);
    let host = PartyId(10000);
    let arbiter = PartyId(10000);

    let mut pipeline = Pipeline::new();
    pipeline.set_initiator(Role::Guest, guest)?.set_roles(RoleTable {
        guest: vec![guest],
        host: vec![host],
        arbiter: vec![arbiter],
    })?;

    let reader_0 = pipeline.add_component(
        reader("reader_0")
            .with_role_param(
                Role::Guest,
                "table",
                json!({"name": "dvisits_hetero_guest", "namespace": "experiment"}),
            )?
            .with_role_param(
                Role::Host,
                "table",
                json!({"name": "dvisits_hetero_host", "namespace": "experiment"}),
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
            .with_param("init_param", json!({"init_method": "zeros"}))?,
        Data::train_data(intersection_0.output("data")),
    )?;

    pipeline.add_component(
        evaluation("evaluation_0")
            .with_param("eval_type", json!("regression"))?
            .with_param("pos_label", json!(1))?,
        Data::data(hetero_regression_0.output("data")),
    )?;

    pipeline.compile()?;

    let runner = LocalRunner::new();
    let (backend, work_mode) = (Backend(0), WorkMode(0));
    pipeline.fit(&runner, backend, work_mode).await?;

    let learner = pipeline.get_component("hetero_regression_0").unwrap();
    println!("model param: {:#}", learner.model_param().unwrap());
    println!("summary: {:#}", learner.summary());
    println!(
        "evaluation: {:#}",
        pipeline.get_component("evaluation_0").unwrap().summary()
    );

    // Freeze the trained transform and learner, then score fresh data.
    let deployed = pipeline.deploy_component(&[&data_transform_0, &hetero_regression_0])?;

    let mut predict_pipeline = Pipeline::new();
    let reader_1 = predict_pipeline.add_component(
        reader("reader_1")
            .with_role_param(
                Role::Guest,
                "table",
                json!({"name": "dvisits_hetero_guest", "namespace": "experiment"}),
            )?
            .with_role_param(
                Role::Host,
                "table",
                json!({"name": "dvisits_hetero_host", "namespace": "experiment"}),
            )?,
        Data::new(),
    )?;
    predict_pipeline.add_deployed(
        &deployed,
        PredictInput::new().map(
            deployed.entry("data_transform_0", "data").unwrap(),
            reader_1.output("data"),
        ),
    )?;
    predict_pipeline.predict(&runner, backend, work_mode).await?;

    let scores = predict_pipeline.get_component("hetero_regression_0").unwrap();
    println!("predictions: {:#}", scores.output(guest, "data").unwrap());

    Ok(())
}
