// ABOUTME: Compile-fail test verifying ContainerId and ImageId are not interchangeable.
// ABOUTME: This test should fail to compile, validating type safety.

use nestkeeper::types::{ContainerId, ImageId};

fn takes_container_id(_id: ContainerId) {}

fn main() {
    let image_id = ImageId::new("sha256:abc");
    takes_container_id(image_id); // ERROR: expected ContainerId, found ImageId
}
