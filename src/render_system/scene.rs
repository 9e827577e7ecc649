use std::sync::Arc;

use image::RgbaImage;
use rand::Rng;
use vulkano::{
    buffer::{Buffer, BufferContents, BufferCreateInfo, BufferUsage, Subbuffer},
    command_buffer::{
        allocator::StandardCommandBufferAllocator, AutoCommandBufferBuilder, CommandBufferUsage,
        CopyBufferToImageInfo, PrimaryCommandBufferAbstract,
    },
    device::Queue,
    format::Format,
    image::{view::ImageView, Image, ImageCreateInfo, ImageType, ImageUsage},
    memory::allocator::{AllocationCreateInfo, MemoryTypeFilter, StandardMemoryAllocator},
    sync::GpuFuture,
};

use crate::error::RenderError;

pub const MATERIAL_LAMBERT: u32 = 0;
pub const MATERIAL_METAL: u32 = 1;
pub const MATERIAL_EMISSIVE: u32 = 2;

const NOISE_EXTENT: u32 = 256;

/// One analytic sphere as laid out in the sampling shader's object buffer
/// (scalar block layout, 48 bytes).
#[derive(Clone, Copy, Debug, BufferContents)]
#[repr(C)]
pub struct SphereData {
    pub center: [f32; 3],
    pub radius: f32,
    pub albedo: [f32; 3],
    pub material: u32,
    pub emission: [f32; 3],
    // fuzz radius for metal, unused otherwise
    pub param: f32,
}

impl SphereData {
    pub fn lambert(center: [f32; 3], radius: f32, albedo: [f32; 3]) -> SphereData {
        SphereData {
            center,
            radius,
            albedo,
            material: MATERIAL_LAMBERT,
            emission: [0.0; 3],
            param: 0.0,
        }
    }

    pub fn metal(center: [f32; 3], radius: f32, albedo: [f32; 3], fuzz: f32) -> SphereData {
        SphereData {
            center,
            radius,
            albedo,
            material: MATERIAL_METAL,
            emission: [0.0; 3],
            param: fuzz,
        }
    }

    pub fn emissive(center: [f32; 3], radius: f32, emission: [f32; 3]) -> SphereData {
        SphereData {
            center,
            radius,
            albedo: [0.0; 3],
            material: MATERIAL_EMISSIVE,
            emission,
            param: 0.0,
        }
    }
}

/// GPU-resident scene data bound into the sampling stage: the sphere
/// buffer, the object count, and the random-noise texture seeding the
/// shader RNG. Read-only for the lifetime of the session once uploaded.
pub struct SceneBundle {
    objects: Subbuffer<[SphereData]>,
    num_objects: u32,
    noise: Arc<ImageView>,
}

impl SceneBundle {
    /// Uploads the scene to device memory. Blocks until the transfer has
    /// completed, so the bundle is fully bound and ready when this returns.
    pub fn upload(
        queue: Arc<Queue>,
        command_buffer_allocator: Arc<StandardCommandBufferAllocator>,
        memory_allocator: Arc<StandardMemoryAllocator>,
        spheres: Vec<SphereData>,
    ) -> Result<SceneBundle, RenderError> {
        let num_objects = spheres.len() as u32;

        let objects = Buffer::from_iter(
            memory_allocator.clone(),
            BufferCreateInfo {
                usage: BufferUsage::STORAGE_BUFFER,
                ..Default::default()
            },
            AllocationCreateInfo {
                memory_type_filter: MemoryTypeFilter::PREFER_DEVICE
                    | MemoryTypeFilter::HOST_SEQUENTIAL_WRITE,
                ..Default::default()
            },
            spheres,
        )?;

        let noise = upload_noise_texture(queue, command_buffer_allocator, memory_allocator)?;

        Ok(SceneBundle {
            objects,
            num_objects,
            noise,
        })
    }

    pub fn objects(&self) -> Subbuffer<[SphereData]> {
        self.objects.clone()
    }

    pub fn num_objects(&self) -> u32 {
        self.num_objects
    }

    pub fn noise(&self) -> Arc<ImageView> {
        self.noise.clone()
    }
}

fn upload_noise_texture(
    queue: Arc<Queue>,
    command_buffer_allocator: Arc<StandardCommandBufferAllocator>,
    memory_allocator: Arc<StandardMemoryAllocator>,
) -> Result<Arc<ImageView>, RenderError> {
    let mut rng = rand::rng();
    let mut noise = RgbaImage::new(NOISE_EXTENT, NOISE_EXTENT);
    for pixel in noise.pixels_mut() {
        pixel.0 = rng.random();
    }

    let mut builder = AutoCommandBufferBuilder::primary(
        command_buffer_allocator.clone(),
        queue.queue_family_index(),
        CommandBufferUsage::OneTimeSubmit,
    )
    .unwrap();

    let upload_buffer = Buffer::from_iter(
        memory_allocator.clone(),
        BufferCreateInfo {
            usage: BufferUsage::TRANSFER_SRC,
            ..Default::default()
        },
        AllocationCreateInfo {
            memory_type_filter: MemoryTypeFilter::PREFER_HOST
                | MemoryTypeFilter::HOST_SEQUENTIAL_WRITE,
            ..Default::default()
        },
        noise.into_raw(),
    )?;

    let image = Image::new(
        memory_allocator,
        ImageCreateInfo {
            image_type: ImageType::Dim2d,
            format: Format::R8G8B8A8_UNORM,
            extent: [NOISE_EXTENT, NOISE_EXTENT, 1],
            usage: ImageUsage::TRANSFER_DST | ImageUsage::SAMPLED,
            ..Default::default()
        },
        AllocationCreateInfo::default(),
    )?;

    builder
        .copy_buffer_to_image(CopyBufferToImageInfo::buffer_image(
            upload_buffer,
            image.clone(),
        ))
        .unwrap();

    let future = builder.build().unwrap().execute(queue)?;
    future.then_signal_fence_and_flush()?.wait(None)?;

    Ok(ImageView::new_default(image)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sphere_layout_matches_the_shader_block() {
        // scalar block layout packs vec3 + float pairs back to back
        assert_eq!(std::mem::size_of::<SphereData>(), 48);
    }

    #[test]
    fn constructors_tag_materials() {
        assert_eq!(
            SphereData::lambert([0.0; 3], 1.0, [0.5; 3]).material,
            MATERIAL_LAMBERT
        );
        assert_eq!(
            SphereData::metal([0.0; 3], 1.0, [0.5; 3], 0.1).material,
            MATERIAL_METAL
        );
        let light = SphereData::emissive([0.0; 3], 1.0, [4.0; 3]);
        assert_eq!(light.material, MATERIAL_EMISSIVE);
        assert_eq!(light.emission, [4.0; 3]);
    }
}
