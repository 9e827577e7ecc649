use std::sync::Arc;

use nalgebra::{Matrix4, Point3};
use vulkano::{
    buffer::{Buffer, BufferCreateInfo, BufferUsage, Subbuffer},
    command_buffer::{
        allocator::StandardCommandBufferAllocator, AutoCommandBufferBuilder, CommandBufferUsage,
        CopyBufferToImageInfo,
    },
    descriptor_set::{layout::DescriptorSetLayoutCreateFlags, WriteDescriptorSet},
    device::{
        physical::PhysicalDeviceType, Device, DeviceCreateInfo, DeviceExtensions, DeviceOwned,
        DeviceFeatures, Queue, QueueCreateInfo, QueueFlags,
    },
    format::{Format, FormatFeatures},
    image::{Image, ImageUsage},
    instance::Instance,
    memory::allocator::{AllocationCreateInfo, MemoryTypeFilter, StandardMemoryAllocator},
    pipeline::{
        compute::ComputePipelineCreateInfo, layout::PipelineDescriptorSetLayoutCreateInfo,
        ComputePipeline, Pipeline, PipelineBindPoint, PipelineLayout,
        PipelineShaderStageCreateInfo,
    },
    shader::EntryPoint,
    swapchain::{self, Surface, Swapchain, SwapchainCreateInfo, SwapchainPresentInfo},
    sync::{self, GpuFuture},
    Validated, VulkanError,
};
use winit::window::Window;

use crate::{
    camera::deg2rad,
    config::RenderSettings,
    error::RenderError,
    render_system::{
        canvas_shader,
        color_cache::{ColorCache, CACHE_FORMAT},
        sample_shader,
        scene::SceneBundle,
    },
};

pub fn get_device_for_rendering_on(
    instance: Arc<Instance>,
    surface: Arc<Surface>,
) -> Result<(Arc<Device>, Arc<Queue>), RenderError> {
    let device_extensions = DeviceExtensions {
        khr_swapchain: true,
        khr_push_descriptor: true,
        ..DeviceExtensions::empty()
    };
    let features = DeviceFeatures {
        shader_int8: true,
        storage_buffer8_bit_access: true,
        ..DeviceFeatures::empty()
    };
    let (physical_device, general_queue_family_index) = instance
        .enumerate_physical_devices()?
        .filter(|p| p.supported_extensions().contains(&device_extensions))
        .filter_map(|p| {
            // find a queue that can run compute work and present to the surface
            let general_queue_family_index = p
                .queue_family_properties()
                .iter()
                .enumerate()
                .position(|(i, q)| {
                    q.queue_flags.contains(QueueFlags::COMPUTE)
                        && p.surface_support(i as u32, &surface).unwrap_or(false)
                });

            general_queue_family_index.map(|q| (p, q as u32))
        })
        .min_by_key(|(p, _)| match p.properties().device_type {
            PhysicalDeviceType::DiscreteGpu => 0,
            PhysicalDeviceType::IntegratedGpu => 1,
            PhysicalDeviceType::VirtualGpu => 2,
            PhysicalDeviceType::Cpu => 3,
            PhysicalDeviceType::Other => 4,
            _ => 5,
        })
        .ok_or(RenderError::NoSuitableDevice)?;

    // the accumulation cache needs float storage images; without them the
    // session cannot start at all
    let format_properties = physical_device.format_properties(CACHE_FORMAT).unwrap();
    if !format_properties
        .optimal_tiling_features
        .contains(FormatFeatures::STORAGE_IMAGE | FormatFeatures::SAMPLED_IMAGE)
    {
        return Err(RenderError::MissingCapability(
            "floating-point storage images (R32G32B32A32_SFLOAT)",
        ));
    }

    let (device, mut queues) = Device::new(
        physical_device,
        DeviceCreateInfo {
            enabled_extensions: device_extensions,
            enabled_features: features,
            queue_create_infos: vec![QueueCreateInfo {
                queue_family_index: general_queue_family_index,
                ..Default::default()
            }],
            ..Default::default()
        },
    )?;

    let general_queue = queues.next().unwrap();

    Ok((device, general_queue))
}

fn create_swapchain(
    device: Arc<Device>,
    surface: Arc<Surface>,
) -> Result<(Arc<Swapchain>, Vec<Arc<Image>>), RenderError> {
    let surface_capabilities = device
        .physical_device()
        .surface_capabilities(&surface, Default::default())
        .unwrap();

    let window = surface.object().unwrap().downcast_ref::<Window>().unwrap();

    Ok(Swapchain::new(
        device.clone(),
        surface.clone(),
        SwapchainCreateInfo {
            min_image_count: 3,
            image_format: Format::B8G8R8A8_SRGB,
            image_extent: window.inner_size().into(),
            image_usage: ImageUsage::TRANSFER_DST,
            composite_alpha: surface_capabilities
                .supported_composite_alpha
                .into_iter()
                .next()
                .unwrap(),

            ..Default::default()
        },
    )?)
}

pub fn get_surface_extent(surface: &Surface) -> [u32; 2] {
    let window = surface.object().unwrap().downcast_ref::<Window>().unwrap();
    window.inner_size().into()
}

// one byte buffer per swapchain image; the display stage writes into it and
// the pass ends with a buffer-to-image copy
fn create_display_buffers(
    memory_allocator: Arc<StandardMemoryAllocator>,
    images: &[Arc<Image>],
) -> Result<Vec<Subbuffer<[u8]>>, RenderError> {
    images
        .iter()
        .map(|image| {
            let extent = image.extent();
            Buffer::new_slice::<u8>(
                memory_allocator.clone(),
                BufferCreateInfo {
                    usage: BufferUsage::STORAGE_BUFFER | BufferUsage::TRANSFER_SRC,
                    ..Default::default()
                },
                AllocationCreateInfo {
                    memory_type_filter: MemoryTypeFilter::PREFER_DEVICE,
                    ..Default::default()
                },
                (extent[0] * extent[1] * 4) as u64,
            )
            .map_err(RenderError::from)
        })
        .collect()
}

fn create_compute_pipeline(
    device: Arc<Device>,
    cs: EntryPoint,
) -> Result<Arc<ComputePipeline>, RenderError> {
    let stage = PipelineShaderStageCreateInfo::new(cs);

    let layout = {
        let mut layout_create_info =
            PipelineDescriptorSetLayoutCreateInfo::from_stages(&[stage.clone()]);
        // enable push descriptor for set 0
        layout_create_info.set_layouts[0].flags |= DescriptorSetLayoutCreateFlags::PUSH_DESCRIPTOR;

        PipelineLayout::new(
            device.clone(),
            layout_create_info
                .into_pipeline_layout_create_info(device.clone())
                .unwrap(),
        )?
    };

    Ok(ComputePipeline::new(
        device,
        None,
        ComputePipelineCreateInfo::stage_layout(stage, layout),
    )?)
}

fn group_count(extent: &[u32; 2]) -> [u32; 3] {
    [extent[0].div_ceil(32), extent[1].div_ceil(32), 1]
}

// pinhole eye-to-image-plane distance for a vertical field of view in degrees
pub(crate) fn eye_to_image_distance(half_ht: f32, fov_degrees: f32) -> f32 {
    half_ht / (deg2rad(fov_degrees) * 0.5).tan()
}

/// Owns the sampling and display pipelines, the accumulation cache, and the
/// swapchain, and executes one pass at a time against them.
pub struct Renderer {
    surface: Arc<Surface>,
    device: Arc<Device>,
    queue: Arc<Queue>,
    memory_allocator: Arc<StandardMemoryAllocator>,
    command_buffer_allocator: Arc<StandardCommandBufferAllocator>,
    swapchain: Arc<Swapchain>,
    swapchain_images: Vec<Arc<Image>>,
    display_buffers: Vec<Subbuffer<[u8]>>,
    sample_pipeline: Arc<ComputePipeline>,
    canvas_pipeline: Arc<ComputePipeline>,
    color_cache: ColorCache,
    scene: SceneBundle,
    render_extent: [u32; 2],
    wdd_needs_rebuild: bool,
    previous_frame_end: Option<Box<dyn GpuFuture>>,
}

impl Renderer {
    /// The scene bundle must be fully uploaded before the renderer is built;
    /// taking it by value makes issuing a pass against an unbound scene
    /// unrepresentable.
    pub fn new(
        surface: Arc<Surface>,
        queue: Arc<Queue>,
        command_buffer_allocator: Arc<StandardCommandBufferAllocator>,
        memory_allocator: Arc<StandardMemoryAllocator>,
        scene: SceneBundle,
    ) -> Result<Renderer, RenderError> {
        let device = memory_allocator.device().clone();

        let (swapchain, swapchain_images) = create_swapchain(device.clone(), surface.clone())?;
        let render_extent = get_surface_extent(&surface);

        let sample_pipeline = create_compute_pipeline(
            device.clone(),
            sample_shader::load(device.clone())?
                .entry_point("main")
                .unwrap(),
        )?;
        let canvas_pipeline = create_compute_pipeline(
            device.clone(),
            canvas_shader::load(device.clone())?
                .entry_point("main")
                .unwrap(),
        )?;

        let display_buffers = create_display_buffers(memory_allocator.clone(), &swapchain_images)?;
        let color_cache = ColorCache::new(memory_allocator.clone(), render_extent)?;

        Ok(Renderer {
            surface,
            queue,
            command_buffer_allocator,
            previous_frame_end: Some(sync::now(device.clone()).boxed()),
            device,
            swapchain,
            swapchain_images,
            display_buffers,
            sample_pipeline,
            canvas_pipeline,
            color_cache,
            scene,
            render_extent,
            memory_allocator,
            wdd_needs_rebuild: false,
        })
    }

    pub fn rebuild(&mut self, extent: [u32; 2]) {
        let (new_swapchain, new_images) = self
            .swapchain
            .recreate(SwapchainCreateInfo {
                image_extent: extent,
                ..self.swapchain.create_info()
            })
            .expect("failed to recreate swapchain");

        self.swapchain = new_swapchain;
        self.swapchain_images = new_images;
        self.display_buffers =
            create_display_buffers(self.memory_allocator.clone(), &self.swapchain_images)
                .expect("failed to recreate display buffers");
    }

    /// Executes one full pass: one sampling dispatch accumulating into the
    /// cache, one display dispatch onto the swapchain image, then present.
    /// `render_pass` is the 1-based pass index of the convergence run.
    pub fn render(
        &mut self,
        render_pass: u32,
        eye_to_world: Matrix4<f32>,
        settings: &RenderSettings,
    ) {
        // free memory
        self.previous_frame_end.as_mut().unwrap().cleanup_finished();

        if self.wdd_needs_rebuild {
            self.rebuild(get_surface_extent(&self.surface));
            self.wdd_needs_rebuild = false;
            log::info!("rebuilt swapchain");
        }

        // Do not draw a pass when screen dimensions are zero.
        // On Windows, this can occur from minimizing the application.
        let win_extent = get_surface_extent(&self.surface);
        if win_extent[0] == 0 || win_extent[1] == 0 {
            return;
        }

        let (image_index, suboptimal, acquire_future) =
            match swapchain::acquire_next_image(self.swapchain.clone(), None)
                .map_err(Validated::unwrap)
            {
                Ok(r) => r,
                Err(VulkanError::OutOfDate) => {
                    log::warn!("swapchain out of date (at acquire)");
                    self.wdd_needs_rebuild = true;
                    return;
                }
                Err(e) => panic!("failed to acquire next image: {:?}", e),
            };

        if suboptimal {
            self.wdd_needs_rebuild = true;
        }

        let mut builder = AutoCommandBufferBuilder::primary(
            self.command_buffer_allocator.clone(),
            self.queue.queue_family_index(),
            CommandBufferUsage::OneTimeSubmit,
        )
        .unwrap();

        // a fresh convergence run accumulates from zero
        if render_pass <= 1 {
            self.color_cache.record_clear(&mut builder);
        }

        let (target, source) = self.color_cache.swap_for_pass();

        let [wd, ht] = self.render_extent;
        let half_wd = wd as f32 * 0.5;
        let half_ht = ht as f32 * 0.5;
        let eye_position = eye_to_world.transform_point(&Point3::origin());

        builder
            .bind_pipeline_compute(self.sample_pipeline.clone())
            .unwrap()
            .push_descriptor_set(
                PipelineBindPoint::Compute,
                self.sample_pipeline.layout().clone(),
                0,
                vec![
                    WriteDescriptorSet::image_view(0, target),
                    WriteDescriptorSet::image_view_sampler(1, source, self.color_cache.sampler()),
                    WriteDescriptorSet::buffer(2, self.scene.objects()),
                    WriteDescriptorSet::image_view_sampler(
                        3,
                        self.scene.noise(),
                        self.color_cache.sampler(),
                    ),
                ]
                .into(),
            )
            .unwrap()
            .push_constants(
                self.sample_pipeline.layout().clone(),
                0,
                sample_shader::PushConstants {
                    u_eye_to_world: eye_to_world,
                    u_eye_position: eye_position.coords,
                    u_half_wd: half_wd,
                    u_half_ht: half_ht,
                    u_eye_to_image: eye_to_image_distance(half_ht, settings.camera_fov),
                    u_num_objects: self.scene.num_objects() as i32,
                    u_render_pass: render_pass as i32,
                    u_num_bounces: settings.num_bounces as i32,
                    u_shading: settings.shading as i32,
                },
            )
            .unwrap()
            .dispatch(group_count(&self.render_extent))
            .unwrap();

        builder
            .bind_pipeline_compute(self.canvas_pipeline.clone())
            .unwrap()
            .push_descriptor_set(
                PipelineBindPoint::Compute,
                self.canvas_pipeline.layout().clone(),
                0,
                vec![
                    WriteDescriptorSet::image_view_sampler(
                        0,
                        self.color_cache.current_result(),
                        self.color_cache.sampler(),
                    ),
                    WriteDescriptorSet::buffer(1, self.display_buffers[image_index as usize].clone()),
                ]
                .into(),
            )
            .unwrap()
            .push_constants(
                self.canvas_pipeline.layout().clone(),
                0,
                canvas_shader::PushConstants {
                    u_half_wd: half_wd,
                    u_half_ht: half_ht,
                    u_render_pass: render_pass as i32,
                },
            )
            .unwrap()
            .dispatch(group_count(&self.render_extent))
            .unwrap()
            .copy_buffer_to_image(CopyBufferToImageInfo::buffer_image(
                self.display_buffers[image_index as usize].clone(),
                self.swapchain_images[image_index as usize].clone(),
            ))
            .unwrap();

        let command_buffer = builder.build().unwrap();

        let future = self
            .previous_frame_end
            .take()
            .unwrap()
            .join(acquire_future)
            .then_execute(self.queue.clone(), command_buffer)
            .unwrap()
            .then_swapchain_present(
                self.queue.clone(),
                SwapchainPresentInfo::swapchain_image_index(self.swapchain.clone(), image_index),
            )
            .then_signal_fence_and_flush();

        match future.map_err(Validated::unwrap) {
            Ok(future) => {
                self.previous_frame_end = Some(future.boxed());
            }
            Err(VulkanError::OutOfDate) => {
                self.wdd_needs_rebuild = true;
                log::warn!("swapchain out of date (at flush)");
                self.previous_frame_end = Some(sync::now(self.device.clone()).boxed());
            }
            Err(e) => {
                log::error!("failed to flush future: {e}");
                self.previous_frame_end = Some(sync::now(self.device.clone()).boxed());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eye_to_image_follows_pinhole_projection() {
        // a 90 degree fov puts the image plane exactly half_ht away
        assert!((eye_to_image_distance(300.0, 90.0) - 300.0).abs() < 1e-3);
        // narrowing the fov pushes the image plane out
        assert!(eye_to_image_distance(300.0, 45.0) > eye_to_image_distance(300.0, 90.0));
    }

    #[test]
    fn group_count_covers_the_full_extent() {
        assert_eq!(group_count(&[800, 600]), [25, 19, 1]);
        assert_eq!(group_count(&[32, 32]), [1, 1, 1]);
        assert_eq!(group_count(&[33, 1]), [2, 1, 1]);
    }
}
