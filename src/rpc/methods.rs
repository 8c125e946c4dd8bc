//! Handlers of registered methods.

use crate::bridge::address::parse_address;
use crate::bridge::annotation::Rgb;
use crate::bridge::session::Session;
use crate::error::Error;
use crate::rpc::protocol::Params;
use crate::rpc::registry::MethodRegistry;
use crate::{sync_debug, sync_info, weak_error};
use serde_json::{json, Value};

const DEFAULT_COLOR: &str = "0xff0000";

pub(super) fn shutdown(_: &MethodRegistry, s: &mut Session, p: Params) -> Result<Value, Error> {
    p.expect_len(0, 0)?;
    if s.terminate() {
        sync_info!(target: "rpc", "rpc server stop requested");
    } else {
        sync_debug!(target: "rpc", "rpc server already stopping");
    }
    Ok(json!(0))
}

pub(super) fn version(_: &MethodRegistry, s: &mut Session, p: Params) -> Result<Value, Error> {
    p.expect_len(0, 0)?;
    let (name, version) = s.tool();
    Ok(json!([name, version]))
}

pub(super) fn jump(_: &MethodRegistry, s: &mut Session, p: Params) -> Result<Value, Error> {
    p.expect_len(1, 1)?;
    let Some(addr) = weak_error!(parse_address(p.str(0)?), "jump:") else {
        return Ok(json!(false));
    };
    Ok(json!(s.navigator().move_focus(addr)))
}

pub(super) fn comment(_: &MethodRegistry, s: &mut Session, p: Params) -> Result<Value, Error> {
    p.expect_len(2, 2)?;
    let text = p.str(1)?;
    let Some(addr) = weak_error!(parse_address(p.str(0)?), "comment:") else {
        return Ok(json!(false));
    };
    let routine = s
        .sink()
        .find_containing_routine(addr)
        .ok_or(Error::RoutineNotFound(addr));
    let Some(routine) = weak_error!(routine, "comment:") else {
        return Ok(json!(false));
    };
    Ok(json!(s.sink().set_comment(&routine, addr, text)))
}

pub(super) fn set_color(_: &MethodRegistry, s: &mut Session, p: Params) -> Result<Value, Error> {
    p.expect_len(1, 2)?;
    let Some(addr) = weak_error!(parse_address(p.str(0)?), "setcolor:") else {
        return Ok(json!(false));
    };
    let Some(color) = weak_error!(p.str_or(1, DEFAULT_COLOR)?.parse::<Rgb>(), "setcolor:") else {
        return Ok(json!(false));
    };
    let routine = s
        .sink()
        .find_containing_routine(addr)
        .ok_or(Error::RoutineNotFound(addr));
    if weak_error!(routine, "setcolor:").is_none() {
        return Ok(json!(false));
    }
    Ok(json!(s.sink().highlight(addr, Some(color))))
}

pub(super) fn synchronize(_: &MethodRegistry, s: &mut Session, p: Params) -> Result<Value, Error> {
    p.expect_len(3, 3)?;
    let reply = s
        .sync_mut()
        .synchronize(&p.offset(0)?, &p.offsets(1)?, &p.offsets(2)?)?;
    let added: Vec<u64> = reply.added.into_iter().map(u64::from).collect();
    let removed: Vec<u64> = reply.removed.into_iter().map(u64::from).collect();
    Ok(json!([added, removed]))
}

pub(super) fn list_methods(r: &MethodRegistry, _: &mut Session, p: Params) -> Result<Value, Error> {
    p.expect_len(0, 0)?;
    Ok(json!(r.list_exposed_methods()))
}

pub(super) fn method_help(r: &MethodRegistry, _: &mut Session, p: Params) -> Result<Value, Error> {
    p.expect_len(1, 1)?;
    Ok(json!(r.method_help(p.str(0)?)?))
}

pub(super) fn add_breakpoint(
    _: &MethodRegistry,
    s: &mut Session,
    p: Params,
) -> Result<Value, Error> {
    p.expect_len(1, 1)?;
    let addr = parse_address(p.str(0)?)?;
    Ok(json!(s.sync_mut().add_breakpoint(addr)))
}

pub(super) fn delete_breakpoint(
    _: &MethodRegistry,
    s: &mut Session,
    p: Params,
) -> Result<Value, Error> {
    p.expect_len(1, 1)?;
    let addr = parse_address(p.str(0)?)?;
    Ok(json!(s.sync_mut().delete_breakpoint(addr)))
}
