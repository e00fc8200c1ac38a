pub mod opendrive;
