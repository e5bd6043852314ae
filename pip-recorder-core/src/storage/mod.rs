pub mod artifact_writer;
