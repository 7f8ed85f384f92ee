use gdx_sys::{CallError, ObjectPtr, VariantType};

use super::{float_arg, int_arg, node_path, text_arg, this_id};
use crate::classdb::ClassInfo;
use crate::hooks::report_error;
use crate::objects;
use crate::value::Var;

#[derive(Debug, Clone)]
pub struct Track {
    pub kind: i64,
    pub path: String,
    /// Sorted by time.
    pub keys: Vec<(f64, Var)>,
}

#[derive(Debug)]
pub struct AnimationState {
    pub tracks: Vec<Track>,
    pub length: f64,
}

impl Default for AnimationState {
    fn default() -> Self {
        Self {
            tracks: Vec::new(),
            length: 1.0,
        }
    }
}

pub fn animation_class() -> ClassInfo {
    ClassInfo::engine("Animation", Some("Resource"))
        .refcounted()
        .method("add_track", "int(enum::Animation.TrackType,int)", add_track)
        .method("remove_track", "void(int)", remove_track)
        .method("get_track_count", "int() const", get_track_count)
        .method("track_get_type", "enum::Animation.TrackType(int) const", track_get_type)
        .method("track_swap", "void(int,int)", track_swap)
        .method("track_set_path", "void(int,NodePath)", track_set_path)
        .method("track_get_path", "NodePath(int) const", track_get_path)
        .method("track_insert_key", "int(int,float,Variant)", track_insert_key)
        .method("track_get_key_count", "int(int) const", track_get_key_count)
        .method("track_get_key_value", "Variant(int,int) const", track_get_key_value)
        .method("set_length", "void(float)", set_length)
        .method("get_length", "float() const", get_length)
        .property("length", VariantType::Float, "set_length", "get_length")
}

/// Run `f` on the animation state of `this`; `Ok(None)` for a bad track index.
fn with_track<R>(
    this: ObjectPtr,
    track: i64,
    f: impl FnOnce(&mut Track) -> R,
) -> Result<Option<R>, CallError> {
    let id = this_id(this)?;
    let result = objects::with(id, |object| {
        let animation = object.animation.as_mut()?;
        let count = animation.tracks.len();
        match usize::try_from(track).ok().and_then(|i| animation.tracks.get_mut(i)) {
            Some(track) => Some(Ok(f(track))),
            None => Some(Err(count)),
        }
    })
    .flatten();
    match result {
        Some(Ok(value)) => Ok(Some(value)),
        Some(Err(count)) => {
            report_error(format!(
                "Index p_track = {track} is out of bounds (tracks.size() = {count})."
            ));
            Ok(None)
        }
        None => Ok(None),
    }
}

fn with_state<R>(
    this: ObjectPtr,
    f: impl FnOnce(&mut AnimationState) -> R,
) -> Result<Option<R>, CallError> {
    let id = this_id(this)?;
    Ok(objects::with(id, |object| object.animation.as_mut().map(f)).flatten())
}

fn add_track(this: ObjectPtr, args: &[Var]) -> Result<Var, CallError> {
    let kind = int_arg(args, 0);
    let position = int_arg(args, 1);
    let index = with_state(this, |animation| {
        let track = Track {
            kind,
            path: String::new(),
            keys: Vec::new(),
        };
        let len = animation.tracks.len();
        let index = match usize::try_from(position) {
            Ok(position) if position <= len => position,
            _ => len,
        };
        animation.tracks.insert(index, track);
        index as i64
    })?;
    Ok(Var::from_int(index.unwrap_or(-1)))
}

fn remove_track(this: ObjectPtr, args: &[Var]) -> Result<Var, CallError> {
    let track = int_arg(args, 0);
    let removed = with_state(this, |animation| match usize::try_from(track) {
        Ok(index) if index < animation.tracks.len() => {
            animation.tracks.remove(index);
            None
        }
        _ => Some(animation.tracks.len()),
    })?;
    if let Some(Some(count)) = removed {
        report_error(format!(
            "Index p_track = {track} is out of bounds (tracks.size() = {count})."
        ));
    }
    Ok(Var::nil())
}

fn get_track_count(this: ObjectPtr, _: &[Var]) -> Result<Var, CallError> {
    let count = with_state(this, |animation| animation.tracks.len() as i64)?;
    Ok(Var::from_int(count.unwrap_or(0)))
}

fn track_get_type(this: ObjectPtr, args: &[Var]) -> Result<Var, CallError> {
    let kind = with_track(this, int_arg(args, 0), |track| track.kind)?;
    Ok(Var::from_int(kind.unwrap_or(0)))
}

fn track_swap(this: ObjectPtr, args: &[Var]) -> Result<Var, CallError> {
    let (a, b) = (int_arg(args, 0), int_arg(args, 1));
    let swapped = with_state(this, |animation| {
        let len = animation.tracks.len() as i64;
        if (0..len).contains(&a) && (0..len).contains(&b) {
            animation.tracks.swap(a as usize, b as usize);
            true
        } else {
            false
        }
    })?;
    if swapped == Some(false) {
        report_error(format!("track_swap: indices {a} and {b} are out of bounds"));
    }
    Ok(Var::nil())
}

fn track_set_path(this: ObjectPtr, args: &[Var]) -> Result<Var, CallError> {
    let path = text_arg(args, 1);
    with_track(this, int_arg(args, 0), |track| track.path = path)?;
    Ok(Var::nil())
}

fn track_get_path(this: ObjectPtr, args: &[Var]) -> Result<Var, CallError> {
    let path = with_track(this, int_arg(args, 0), |track| track.path.clone())?;
    Ok(node_path(&path.unwrap_or_default()))
}

fn track_insert_key(this: ObjectPtr, args: &[Var]) -> Result<Var, CallError> {
    let time = float_arg(args, 1);
    let value = args.get(2).cloned().unwrap_or_default();
    let index = with_track(this, int_arg(args, 0), |track| {
        match track.keys.iter().position(|(t, _)| (*t - time).abs() < 1e-9) {
            Some(existing) => {
                track.keys[existing].1 = value;
                existing as i64
            }
            None => {
                let index = track.keys.partition_point(|(t, _)| *t < time);
                track.keys.insert(index, (time, value));
                index as i64
            }
        }
    })?;
    Ok(Var::from_int(index.unwrap_or(-1)))
}

fn track_get_key_count(this: ObjectPtr, args: &[Var]) -> Result<Var, CallError> {
    let count = with_track(this, int_arg(args, 0), |track| track.keys.len() as i64)?;
    Ok(Var::from_int(count.unwrap_or(0)))
}

fn track_get_key_value(this: ObjectPtr, args: &[Var]) -> Result<Var, CallError> {
    let key = int_arg(args, 1);
    let value = with_track(this, int_arg(args, 0), |track| {
        usize::try_from(key).ok().and_then(|k| track.keys.get(k)).map(|(_, v)| v.clone())
    })?
    .flatten();
    if value.is_none() {
        report_error(format!("track_get_key_value: key index {key} is out of bounds"));
    }
    Ok(value.unwrap_or_default())
}

fn set_length(this: ObjectPtr, args: &[Var]) -> Result<Var, CallError> {
    let length = float_arg(args, 0).max(0.001);
    with_state(this, |animation| animation.length = length)?;
    Ok(Var::nil())
}

fn get_length(this: ObjectPtr, _: &[Var]) -> Result<Var, CallError> {
    let length = with_state(this, |animation| animation.length)?;
    Ok(Var::from_float(length.unwrap_or(1.0)))
}
