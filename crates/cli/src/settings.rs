use crate::{AddGroupArgs, AddOwnerArgs, ColorsCommand, Feature, LimitsCommand};
use anyhow::{Context, Result};
use boardlens_engine::{parse_hex, FileStore, SettingsManager};
use boardlens_protocol::{settings_schema, GroupLimit, OwnerLimit};
use std::path::Path;

pub fn open_store(path: &Path) -> Result<FileStore> {
    FileStore::for_settings_file(path)
        .with_context(|| format!("Unusable settings path {}", path.display()))
}

fn open_manager(path: &Path) -> Result<SettingsManager<FileStore>> {
    SettingsManager::open(open_store(path)?)
        .with_context(|| format!("Failed to load settings from {}", path.display()))
}

fn check_color(color: Option<&str>) -> Result<()> {
    if let Some(color) = color {
        parse_hex(color).with_context(|| format!("Not a #RRGGBB color: {color}"))?;
    }
    Ok(())
}

pub fn run_limits(cmd: LimitsCommand, settings_path: &Path) -> Result<()> {
    let mut manager = open_manager(settings_path)?;
    match cmd {
        LimitsCommand::List { json } => {
            let settings = manager.settings();
            if json {
                let listing = serde_json::json!({
                    "personalWipLimits": settings.personal_wip_limits,
                    "columnGroupWipLimits": settings.column_group_wip_limits,
                });
                println!("{}", serde_json::to_string_pretty(&listing)?);
            } else {
                print!("{}", render_limits(manager.settings()));
            }
        }
        LimitsCommand::AddOwner(args) => {
            let id = add_owner(&mut manager, args)?;
            println!("{id}");
        }
        LimitsCommand::AddGroup(args) => {
            let id = add_group(&mut manager, args)?;
            println!("{id}");
        }
        LimitsCommand::Remove { id } => {
            if !manager.remove_limit(&id)? {
                anyhow::bail!("No limit with id {id}");
            }
        }
        LimitsCommand::Enable { feature } => set_feature(&mut manager, feature, true)?,
        LimitsCommand::Disable { feature } => set_feature(&mut manager, feature, false)?,
    }
    Ok(())
}

fn add_owner(manager: &mut SettingsManager<FileStore>, args: AddOwnerArgs) -> Result<String> {
    check_color(args.color.as_deref())?;
    let limit = OwnerLimit {
        id: args.id.unwrap_or_default(),
        user_id: args.user_id,
        user_name: args.name,
        column_ids: args.columns,
        column_names: args.column_names,
        limit: args.limit,
        color: args.color,
    };
    manager
        .add_owner_limit(limit)
        .context("Failed to add owner limit")
}

fn add_group(manager: &mut SettingsManager<FileStore>, args: AddGroupArgs) -> Result<String> {
    check_color(args.base_color.as_deref())?;
    check_color(args.warning_color.as_deref())?;
    let mut limit = GroupLimit {
        id: args.id.unwrap_or_default(),
        name: args.name,
        column_ids: args.columns,
        column_names: args.column_names,
        limit: args.limit,
        warning_color: args.warning_color,
        ..GroupLimit::default()
    };
    if let Some(color) = args.base_color {
        limit.base_color = color;
    }
    manager
        .add_group_limit(limit)
        .context("Failed to add group limit")
}

fn set_feature(
    manager: &mut SettingsManager<FileStore>,
    feature: Feature,
    enabled: bool,
) -> Result<()> {
    match feature {
        Feature::OwnerLimits => manager.set_owner_limits_enabled(enabled)?,
        Feature::GroupLimits => manager.set_group_limits_enabled(enabled)?,
        Feature::Workload => manager.set_workload_enabled(enabled)?,
    }
    Ok(())
}

fn render_limits(settings: &boardlens_protocol::BoardSettings) -> String {
    let on_off = |enabled: bool| if enabled { "on" } else { "off" };
    let mut out = String::new();

    let owners = &settings.personal_wip_limits;
    out.push_str(&format!("Owner limits ({}):\n", on_off(owners.enabled)));
    for limit in &owners.limits {
        out.push_str(&format!(
            "  {:<12} {:<20} limit {} in [{}]\n",
            limit.id,
            limit.user_name,
            limit.limit,
            columns_label(&limit.column_ids, &limit.column_names)
        ));
    }

    let groups = &settings.column_group_wip_limits;
    out.push_str(&format!("Group limits ({}):\n", on_off(groups.enabled)));
    for limit in &groups.limits {
        out.push_str(&format!(
            "  {:<12} {:<20} limit {} in [{}]\n",
            limit.id,
            limit.name,
            limit.limit,
            columns_label(&limit.column_ids, &limit.column_names)
        ));
    }

    out.push_str(&format!("Workload ({})\n", on_off(settings.workload.enabled)));
    out
}

fn columns_label(ids: &[String], names: &[String]) -> String {
    if ids.is_empty() {
        names.join(", ")
    } else {
        ids.join(", ")
    }
}

pub fn run_colors(cmd: ColorsCommand, settings_path: &Path) -> Result<()> {
    let mut manager = open_manager(settings_path)?;
    match cmd {
        ColorsCommand::Set { owner_id, color } => {
            check_color(Some(&color))?;
            manager.set_owner_color(&owner_id, Some(&color))?;
        }
        ColorsCommand::Clear { owner_id } => manager.set_owner_color(&owner_id, None)?,
    }
    Ok(())
}

pub fn run_schema() -> Result<()> {
    let schema = settings_schema()?;
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
