//! End-to-end tests: the bridge loaded into the reference engine, driven
//! through the generated bindings and through engine-side calls.

mod common;

use common::{Inventory, Spinner, setup};
use gdx::classes::animation::TrackType;
use gdx::classes::file_access::ModeFlags;
use gdx::classes::particle_process_material::EmissionShape;
use gdx::prelude::*;
use gdx::registrar::Instance;
use gdx_testengine::Var;

fn object_var<T: HostClass>(instance: &Instance<T>) -> Var {
    let ptr = instance.base().raw_object().object_ptr();
    Var::from_object(ptr as usize, instance.instance_id())
}

#[test]
fn test_animation_tracks_and_keys() {
    let _engine = setup();
    let mut animation = Animation::new_gd();
    let track = animation.add_track(TrackType::TYPE_VALUE, -1);
    assert_eq!(track, 0);
    let inserted = animation.add_track(TrackType::TYPE_METHOD, 0);
    assert_eq!(inserted, 0, "a position inside the list inserts there");
    assert_eq!(animation.get_track_count(), 2);
    assert_eq!(animation.track_get_type(1), TrackType::TYPE_VALUE);

    animation.track_set_path(1, &NodePath::from("Player:position"));
    assert_eq!(animation.track_get_path(1).to_string(), "Player:position");

    animation.track_insert_key(1, 0.5, &Variant::from(Vector2::new(4.0, 2.0)));
    animation.track_insert_key(1, 0.0, &Variant::from(Vector2::ZERO));
    assert_eq!(animation.track_get_key_count(1), 2);
    assert_eq!(
        animation.track_get_key_value(1, 1).try_to::<Vector2>(),
        Ok(Vector2::new(4.0, 2.0))
    );

    animation.set_length(2.5);
    assert_eq!(animation.get_length(), 2.5);
}

#[test]
fn test_swapping_tracks_moves_their_types() {
    let _engine = setup();
    let mut animation = Animation::new_gd();
    animation.add_track(TrackType::TYPE_VALUE, -1);
    animation.add_track(TrackType::TYPE_POSITION_3D, -1);
    animation.add_track(TrackType::TYPE_METHOD, -1);

    animation.track_swap(0, 2);
    assert_eq!(animation.track_get_type(0), TrackType::TYPE_METHOD);
    assert_eq!(animation.track_get_type(1), TrackType::TYPE_POSITION_3D);
    assert_eq!(animation.track_get_type(2), TrackType::TYPE_VALUE);
}

#[test]
fn test_animation_is_reference_counted() {
    let _engine = setup();
    let animation = Animation::new_gd();
    let id = animation.instance_id();
    assert_eq!(gdx_testengine::reference_count(id), Some(1));

    let second = animation.clone();
    assert_eq!(gdx_testengine::reference_count(id), Some(2));
    assert_eq!(second.get_reference_count(), 2);

    drop(second);
    assert_eq!(gdx_testengine::reference_count(id), Some(1));
    drop(animation);
    assert!(gdx_testengine::is_destroyed(id));
}

#[test]
fn test_file_round_trip_through_engine_storage() {
    let _engine = setup();
    let path = GString::from("user://save.bin");
    {
        let mut file = FileAccess::open(&path, ModeFlags::WRITE).expect("file opens for writing");
        assert!(file.store_16(0xBEEF));
        assert!(file.store_32(7));
        assert!(file.store_buffer(&PackedByteArray::from_slice(&[1, 2, 3])));
        file.close();
    }
    assert_eq!(
        gdx_testengine::read_file("user://save.bin"),
        Some(vec![0xEF, 0xBE, 7, 0, 0, 0, 1, 2, 3])
    );
    assert!(FileAccess::file_exists(&path));

    let mut file = FileAccess::open(&path, ModeFlags::READ).expect("file opens for reading");
    assert_eq!(file.get_length(), 9);
    assert_eq!(file.get_16(), 0xBEEF);
    assert_eq!(file.get_32(), 7);
    assert_eq!(file.get_buffer(8).to_vec(), vec![1, 2, 3]);
    assert!(file.eof_reached());

    file.seek(1);
    assert_eq!(file.get_8(), 0xBE);
}

#[test]
fn test_relative_paths_write_and_read_back() {
    let _engine = setup();
    let path = GString::from("data/x.bin");
    {
        let mut file = FileAccess::open(&path, ModeFlags::WRITE).expect("relative path opens");
        assert!(file.store_buffer(&PackedByteArray::from_slice(&[1, 2, 3, 4])));
        file.close();
    }
    let mut file = FileAccess::open(&path, ModeFlags::READ).expect("file opens for reading");
    assert_eq!(file.get_length(), 4);
    assert_eq!(file.get_buffer(4).to_vec(), vec![1, 2, 3, 4]);
}

#[test]
fn test_sixteen_bit_values_wrap_to_their_width() {
    let _engine = setup();
    let path = GString::from("user://words.bin");
    let mut file = FileAccess::open(&path, ModeFlags::WRITE_READ).expect("file opens");
    for value in [0u16, 1, 0x7FFF, 0x8000, u16::MAX] {
        assert!(file.store_16(value));
    }
    file.seek(0);
    let read: Vec<u16> = (0..5).map(|_| file.get_16()).collect();
    assert_eq!(read, vec![0, 1, 0x7FFF, 0x8000, u16::MAX]);
}

#[test]
fn test_missing_file_reports_open_error() {
    let _engine = setup();
    let file = FileAccess::open(&GString::from("user://missing.bin"), ModeFlags::READ);
    assert!(file.is_none());
    assert_eq!(FileAccess::get_open_error(), Error::ERR_FILE_NOT_FOUND);
    assert!(
        gdx_testengine::captured_errors()
            .iter()
            .any(|message| message.contains("user://missing.bin"))
    );
}

#[test]
fn test_particle_material_emission_box() {
    let _engine = setup();
    let mut material = ParticleProcessMaterial::new_gd();
    assert_eq!(material.get_emission_shape(), EmissionShape::EMISSION_SHAPE_POINT);

    material.set_emission_shape(EmissionShape::EMISSION_SHAPE_BOX);
    material.set_emission_box_extents(Vector3::new(1.0, 2.0, 3.0));
    assert_eq!(material.get_emission_shape(), EmissionShape::EMISSION_SHAPE_BOX);
    assert_eq!(material.get_emission_box_extents(), Vector3::new(1.0, 2.0, 3.0));

    let as_material: Gd<Material> = material.upcast();
    assert_eq!(as_material.class_name().as_deref(), Some("ParticleProcessMaterial"));
    let back = as_material.cast::<ParticleProcessMaterial>().expect("downcast succeeds");
    assert_eq!(back.get_emission_box_extents(), Vector3::new(1.0, 2.0, 3.0));
}

#[test]
fn test_ready_runs_once_and_process_every_frame() {
    let _engine = setup();
    let mut spinner = Instance::<Spinner>::new().expect("Spinner constructs");
    spinner.bind_mut().speed = 90.0;

    let mut root = Engine::singleton().get_scene_root().expect("engine has a scene root");
    root.add_child(&spinner);
    assert!(spinner.base().is_inside_tree());
    assert_eq!(spinner.bind().readies, 1);

    gdx_testengine::iterate(1.0);
    Engine::singleton().iterate(1.0);
    {
        let spinner = spinner.bind();
        assert_eq!(spinner.readies, 1);
        assert_eq!(spinner.frames, 2);
        assert_eq!(spinner.angle, 180.0);
    }

    root.remove_child(&spinner);
    assert!(!spinner.base().is_inside_tree());
    let id = spinner.instance_id();
    unsafe { spinner.free() };
    assert!(gdx_testengine::is_destroyed(id));
}

#[test]
fn test_host_methods_and_properties_through_the_engine() {
    let _engine = setup();
    let spinner = Instance::<Spinner>::new().expect("Spinner constructs");
    let id = spinner.instance_id();

    assert!(gdx_testengine::set_property(id, "speed", &Var::from_float(720.0)));
    assert_eq!(spinner.bind().speed, 720.0);
    assert_eq!(gdx_testengine::get_property(id, "speed").and_then(|v| v.as_float()), Some(720.0));

    spinner.clone().bind_mut().angle = 800.0;
    let turns = gdx_testengine::call_method(id, "turns", &[]).expect("turns is callable");
    assert_eq!(turns.as_int(), Some(2));
    gdx_testengine::ptrcall_method(id, "reset", &[]).expect("reset is callable");
    assert_eq!(spinner.bind().angle, 0.0);

    unsafe { spinner.free() };
}

#[test]
fn test_dynamic_calls_reach_host_methods() {
    let _engine = setup();
    let inventory = Instance::<Inventory>::new().expect("Inventory constructs");
    let mut object: Gd<Object> = inventory.clone().upcast();

    for weight in [4i64, 5, 6] {
        let stored = object.call(&StringName::from("store"), &[weight.to_variant()]);
        assert_eq!(stored.map(|value| value.booleanize()), Ok(true));
    }
    let full = object.call(&StringName::from("store"), &[1i64.to_variant()]);
    assert_eq!(full.map(|value| value.booleanize()), Ok(false));
    assert_eq!(inventory.bind().items.iter().sum::<i64>(), 15);

    let missing = object.call(&StringName::from("unknown"), &[]);
    assert_eq!(missing, Err(CallError::InvalidMethod));
    assert!(object.has_method(&StringName::from("total_weight")));
    assert_eq!(object.to_variant().stringify(), "Inventory(3/3)");
}

#[test]
fn test_host_refcounted_instances_free_with_last_handle() {
    let _engine = setup();
    let inventory = Instance::<Inventory>::new().expect("Inventory constructs");
    let id = inventory.instance_id();
    assert_eq!(gdx_testengine::reference_count(id), Some(1));
    assert_eq!(inventory.bind().capacity, 3);
    assert_eq!(gdx_testengine::class_constant("Inventory", "MAX_CAPACITY"), Some(64));
    assert_eq!(
        gdx_testengine::class_constant_enum("Inventory", "MAX_CAPACITY"),
        Some(("Limits".to_string(), false))
    );

    let copy = inventory.clone();
    assert_eq!(gdx_testengine::reference_count(id), Some(2));
    drop(inventory);
    assert!(gdx_testengine::is_live(id));
    drop(copy);
    assert!(gdx_testengine::is_destroyed(id));
}

#[test]
fn test_vector2i_does_not_convert_to_vector3i() {
    let _engine = setup();
    let value = Variant::from(Vector2i::new(3, 4));
    assert_eq!(value.get_type(), VariantType::Vector2i);
    assert_eq!(
        value.convert(VariantType::Vector3i),
        Err(VariantError::ConversionFailed {
            from: VariantType::Vector2i,
            to: VariantType::Vector3i,
        })
    );
    assert_eq!(
        value.try_to::<Vector3i>(),
        Err(VariantError::TypeMismatch {
            expected: VariantType::Vector3i,
            actual: VariantType::Vector2i,
        })
    );
    assert_eq!(value.try_to::<Vector2i>(), Ok(Vector2i::new(3, 4)));
}

#[test]
fn test_utility_functions() {
    let _engine = setup();
    assert_eq!(gdx::utilities::absi(-7), 7);
    assert_eq!(gdx::utilities::lerpf(0.0, 10.0, 0.25), 2.5);
    gdx::utilities::print(&Variant::from("frame="), &[12i64.to_variant()]);
    assert!(gdx_testengine::captured_output().iter().any(|line| line == "frame=12"));
}

#[test]
fn test_scene_tree_hands_back_engine_owned_nodes() {
    let _engine = setup();
    let mut root = Engine::singleton().get_scene_root().expect("engine has a scene root");
    let before = root.get_child_count();

    let child = Node::new_alloc();
    let child_id = child.instance_id();
    let child = child.attach_to(&mut root);
    assert_eq!(root.get_child_count(), before + 1);
    assert_eq!(child.get_parent().map(|parent| parent.instance_id()), Some(root.instance_id()));

    let found = root.get_child(before).expect("the new child is listed");
    assert_eq!(found.instance_id(), child_id);
    root.remove_child(&child);
    assert!(gdx_testengine::is_live(child_id));
    let owned = unsafe { child.take_ownership() }.expect("detached node can be owned again");
    owned.free();
    assert!(gdx_testengine::is_destroyed(child_id));
}

#[test]
fn test_host_classes_are_visible_to_the_engine() {
    let _engine = setup();
    let extension_classes = gdx_testengine::extension_classes();
    assert!(extension_classes.contains(&"Spinner".to_string()));
    assert!(extension_classes.contains(&"Inventory".to_string()));
    assert_eq!(gdx_testengine::class_parent("Spinner").as_deref(), Some("Node"));
    assert!(gdx_testengine::class_properties("Spinner").contains(&"speed".to_string()));

    let registry = gdx::registry::classes();
    assert_eq!(registry.parent_chain("Inventory"), vec!["Inventory", "RefCounted", "Object"]);
    assert!(registry.subclasses("Node").contains(&"Spinner"));
    assert!(registry.find_virtual("Spinner", "_process").is_some());
    assert!(registry.find_virtual("Inventory", "_process").is_none());

    let spinner = Instance::<Spinner>::new().expect("Spinner constructs");
    let var = object_var(&spinner);
    assert_eq!(gdx_testengine::stringify(&var), format!("<Spinner#{}>", spinner.instance_id()));
    unsafe { spinner.free() };
}
