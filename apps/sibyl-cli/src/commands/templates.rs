use sibyl_application::templates;

pub fn run() -> Result<(), String> {
    for template in templates::all() {
        println!("{}", template.name);
        println!("  {}", template.description);
        let params = templates::default_params(&template);
        let rendered = serde_json::to_string(&params)
            .map_err(|err| format!("failed to render params: {err}"))?;
        println!("  defaults: {rendered}");
    }
    Ok(())
}
