//! A node subclass overriding inherited virtuals.

use gdx::prelude::*;

#[derive(HostClass)]
#[class(base = Node, init, overrides(ready, process, exit_tree))]
struct Patrol {
    base: Base<Node>,
    #[var]
    speed: f64,
    #[var]
    waypoints: i64,
    elapsed: f64,
}

impl INode for Patrol {
    fn ready(&mut self) {
        self.elapsed = 0.0;
    }

    fn process(&mut self, delta: f64) {
        self.elapsed += delta * self.speed;
    }

    fn exit_tree(&mut self) {
        self.waypoints = 0;
    }
}

fn main() {
    assert_eq!(<Patrol as HostClass>::CLASS_NAME, "Patrol");
    assert!(<Patrol as INode>::__virtual("process").is_some());
    assert!(<Patrol as INode>::__virtual("physics_process").is_none());
}
