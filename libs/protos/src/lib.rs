//! Checked-in protobuf bindings. Sources live under `proto/`.

pub mod prediction {
    pub mod v1 {
        include!("generated/prediction/v1/prediction.v1.rs");
    }
}
