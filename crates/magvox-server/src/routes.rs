//! Request routing and JSON handlers.

use glam::DVec3;
use magvox_coords::VoxelIndex;
use magvox_edit::{EditError, EditOutcome, EditValue, PartitionRef, query};
use magvox_history::HistoryAction;
use magvox_store::{PartitionInfo, VoxelizationOutput};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tiny_http::Method;

use crate::server::AppState;

/// A successful response body.
#[derive(Debug)]
pub(crate) enum Reply {
    Json(Value),
    Csv { file_name: String, body: Vec<u8> },
}

#[derive(Deserialize)]
struct CreateProjectRequest {
    project_name: String,
    voxel_size: f64,
    origin: [f64; 3],
    points: Vec<[f64; 3]>,
    partition_edge: Option<i32>,
}

#[derive(Deserialize)]
struct RetrieveLayerRequest {
    project_name: String,
    partition_name: String,
    axis: String,
    layer_index: i32,
}

#[derive(Deserialize)]
struct UpdateVoxelsRequest {
    project_name: String,
    partition_name: String,
    voxels: Vec<VoxelIndex>,
    material_id: Option<u16>,
    magnetization: Option<[Option<f64>; 3]>,
}

#[derive(Deserialize)]
struct TargetVoxelsRequest {
    project_name: String,
    partition_name: String,
    voxels: Vec<VoxelIndex>,
}

#[derive(Deserialize)]
struct HistoryRequest {
    project_name: String,
    partition_name: String,
    action: String,
}

/// Dispatches one request. `path` excludes the query string.
pub(crate) fn route(
    method: &Method,
    path: &str,
    query: &str,
    body: &str,
    state: &AppState,
) -> Result<Reply, EditError> {
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    match (method, segments.as_slice()) {
        (Method::Get, ["health"]) => Ok(Reply::Json(json!({ "status": "ok" }))),

        (Method::Get, ["api", "project", "list"]) => {
            let projects = state.catalog().list_projects()?;
            Ok(Reply::Json(json!({ "projects": projects })))
        }
        (Method::Post, ["api", "project"]) => create_project(parse_body(body)?, state),
        (Method::Get, ["api", "project", project, "partitions"]) => {
            let partitions = query::partition_names(state.catalog(), project)?;
            Ok(Reply::Json(json!({
                "project_name": project,
                "partitions": partitions,
            })))
        }
        (Method::Get, ["api", "project", project, partition, "surface"]) => {
            let target = PartitionRef::new(*project, *partition);
            let points: Vec<[f64; 3]> = query::surface(state.catalog(), &target)?
                .into_iter()
                .map(|p| p.to_array())
                .collect();
            Ok(Reply::Json(json!({
                "project_name": project,
                "partition_name": partition,
                "num_voxels": points.len(),
                "points": points,
            })))
        }

        (Method::Get, ["api", "edit", "layers", project, partition]) => {
            let axis = query::parse_axis(query_param(query, "axis").unwrap_or("z"))?;
            let target = PartitionRef::new(*project, *partition);
            let layers = query::layers(state.catalog(), &target, axis)?;
            Ok(Reply::Json(json!({
                "project_name": project,
                "partition_name": partition,
                "axis": axis,
                "layers": layers,
            })))
        }
        (Method::Post, ["api", "edit", "retrieve"]) => retrieve_layer(parse_body(body)?, state),
        (Method::Post, ["api", "edit", "update"]) => update_voxels(parse_body(body)?, state),
        (Method::Post, ["api", "edit", "add"]) => {
            let req: TargetVoxelsRequest = parse_body(body)?;
            let target = PartitionRef::new(req.project_name, req.partition_name);
            let outcome = state.workspace().add_voxels(&target, &req.voxels)?;
            Ok(edit_reply("Voxels added", &target, outcome))
        }
        (Method::Post, ["api", "edit", "delete"]) => {
            let req: TargetVoxelsRequest = parse_body(body)?;
            let target = PartitionRef::new(req.project_name, req.partition_name);
            let outcome = state.workspace().delete_voxels(&target, &req.voxels)?;
            Ok(edit_reply("Voxels deleted", &target, outcome))
        }
        (Method::Post, ["api", "edit", "history"]) => {
            let req: HistoryRequest = parse_body(body)?;
            let action: HistoryAction = req.action.parse()?;
            let target = PartitionRef::new(req.project_name, req.partition_name);
            let outcome = state.workspace().apply_history(&target, action)?;
            let message = match action {
                HistoryAction::Undo => "Undo successful",
                HistoryAction::Redo => "Redo successful",
            };
            Ok(edit_reply(message, &target, outcome))
        }

        (Method::Get, ["api", "export", project]) => {
            let project = state.catalog().project(project)?;
            let mut body = Vec::new();
            project.export_csv(&mut body)?;
            Ok(Reply::Csv {
                file_name: format!("{}.csv", project.name()),
                body,
            })
        }

        _ => Err(EditError::not_found(format!("route {method} {path}"))),
    }
}

fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, EditError> {
    serde_json::from_str(body).map_err(|e| EditError::invalid(format!("malformed request body: {e}")))
}

/// Value of `key` in an `a=1&b=2` query string.
fn query_param<'q>(query: &'q str, key: &str) -> Option<&'q str> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v)
}

fn partition_json(info: &PartitionInfo) -> Value {
    json!({
        "name": info.name,
        "index": info.index,
        "voxel_count": info.voxel_count,
        "bounds": {
            "lo": info.bounds.lo.to_array(),
            "hi": info.bounds.hi.to_array(),
        },
    })
}

fn create_project(req: CreateProjectRequest, state: &AppState) -> Result<Reply, EditError> {
    let output = VoxelizationOutput {
        points: req.points.into_iter().map(DVec3::from_array).collect(),
        origin: DVec3::from_array(req.origin),
        pitch: req.voxel_size,
    };
    let (project, infos) =
        state
            .workspace()
            .create_project(&req.project_name, &output, req.partition_edge)?;
    let num_voxels: usize = infos.iter().map(|i| i.voxel_count).sum();
    Ok(Reply::Json(json!({
        "project_name": project.name(),
        "partitions": infos.iter().map(partition_json).collect::<Vec<_>>(),
        "num_voxels": num_voxels,
    })))
}

fn retrieve_layer(req: RetrieveLayerRequest, state: &AppState) -> Result<Reply, EditError> {
    let axis = query::parse_axis(&req.axis)?;
    let target = PartitionRef::new(req.project_name, req.partition_name);
    let voxels = query::layer(state.catalog(), &target, axis, req.layer_index)?;
    Ok(Reply::Json(json!({
        "project_name": target.project,
        "partition_name": target.partition,
        "layer_index": req.layer_index,
        "axis": axis,
        "num_voxels": voxels.len(),
        "voxels": voxels,
    })))
}

fn update_voxels(req: UpdateVoxelsRequest, state: &AppState) -> Result<Reply, EditError> {
    let value = EditValue::from_parts(req.material_id, req.magnetization)?;
    let target = PartitionRef::new(req.project_name, req.partition_name);
    let outcome = state.workspace().update_voxels(&target, &req.voxels, value)?;
    Ok(edit_reply("Model updated successfully", &target, outcome))
}

fn edit_reply(message: &str, target: &PartitionRef, outcome: EditOutcome) -> Reply {
    Reply::Json(json!({
        "message": message,
        "project_name": target.project,
        "partition_name": target.partition,
        "num_voxels": outcome.affected,
        "undo_empty": outcome.undo_empty,
        "redo_empty": outcome.redo_empty,
    }))
}
